pub mod rpc_pool;

pub use rpc_pool::RpcClientPool;
