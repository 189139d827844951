// Hand-maintained to match src/store/migrations/0001_init.sql; a generated
// schema.rs would normally come from `diesel print-schema` against that
// migration.

diesel::table! {
    users (id) {
        id -> Uuid,
        telegram_id -> Int8,
        chat_id -> Int8,
        created_at -> Timestamptz,
        is_active -> Bool,
    }
}

diesel::table! {
    wallets (id) {
        id -> Uuid,
        user_id -> Uuid,
        chain -> Text,
        public_key -> Text,
        encrypted_secret -> Bytea,
        nonce -> Bytea,
        backup_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    strategies (id) {
        id -> Uuid,
        user_id -> Uuid,
        chain -> Text,
        enabled -> Bool,
        auto_execute -> Bool,
        min_score -> Int4,
        allowed_sources -> Jsonb,
        token_denylist -> Jsonb,
        deployer_denylist -> Jsonb,
        min_liquidity_sol -> Float8,
        max_per_trade_sol -> Float8,
        slippage_bps -> Int4,
        priority_fee_lamports -> Int8,
        tp_bps -> Int4,
        sl_bps -> Int4,
        max_hold_s -> Int8,
        trailing_activation_bps -> Int4,
        trailing_distance_bps -> Int4,
        moon_bag_bps -> Int4,
        snipe_mode -> Text,
        dca_rungs -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    opportunities (id) {
        id -> Uuid,
        source -> Text,
        token_mint -> Text,
        name -> Nullable<Text>,
        symbol -> Nullable<Text>,
        deployer -> Text,
        bonding_curve_addr -> Nullable<Text>,
        initial_liquidity_sol -> Nullable<Float8>,
        score -> Int4,
        reasons -> Jsonb,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    trade_jobs (id) {
        id -> Uuid,
        idempotency_key -> Text,
        strategy_id -> Uuid,
        user_id -> Uuid,
        opportunity_id -> Nullable<Uuid>,
        chain -> Text,
        action -> Text,
        payload -> Jsonb,
        priority -> Int4,
        status -> Text,
        claimed_by -> Nullable<Text>,
        claimed_at -> Nullable<Timestamptz>,
        attempts -> Int4,
        last_error -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    positions (id) {
        id -> Uuid,
        user_id -> Uuid,
        strategy_id -> Uuid,
        chain -> Text,
        token_mint -> Text,
        bonding_curve -> Nullable<Text>,
        entry_tx -> Text,
        entry_price -> Float8,
        entry_cost_sol -> Float8,
        size_tokens -> Float8,
        token_decimals -> Int4,
        lifecycle_state -> Text,
        trigger_state -> Text,
        tp_price -> Nullable<Float8>,
        sl_price -> Nullable<Float8>,
        peak_price -> Nullable<Float8>,
        trailing_stop_price -> Nullable<Float8>,
        partial_exit_taken -> Bool,
        exit_levels_hit -> Jsonb,
        moon_bag_amount -> Nullable<Float8>,
        realized_pnl_sol -> Nullable<Float8>,
        opened_at -> Timestamptz,
        closed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        notif_type -> Text,
        payload -> Jsonb,
        claimed_by -> Nullable<Text>,
        claimed_at -> Nullable<Timestamptz>,
        delivered_at -> Nullable<Timestamptz>,
        attempts -> Int4,
        failed -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    launch_candidates (id) {
        id -> Uuid,
        mint -> Text,
        source -> Text,
        status -> Text,
        reason -> Nullable<Text>,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(wallets -> users (user_id));
diesel::joinable!(strategies -> users (user_id));
diesel::joinable!(positions -> users (user_id));
diesel::joinable!(positions -> strategies (strategy_id));
diesel::joinable!(trade_jobs -> users (user_id));
diesel::joinable!(trade_jobs -> strategies (strategy_id));
diesel::joinable!(notifications -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    wallets,
    strategies,
    opportunities,
    trade_jobs,
    positions,
    notifications,
    launch_candidates,
);
