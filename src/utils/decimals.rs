pub fn tokens_to_ui_amount_f64(amount: u64, decimals: u8) -> f64 {
    if amount == 0 {
        return 0.0;
    }
    amount as f64 / 10u64.pow(decimals as u32) as f64
}

pub fn ui_amount_to_tokens(amount: f64, decimals: u8) -> u64 {
    if amount == 0.0 {
        return 0;
    }
    (amount * 10u64.pow(decimals as u32) as f64) as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * 1_000_000_000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_decimals() {
        let tokens = ui_amount_to_tokens(1.5, 6);
        assert_eq!(tokens_to_ui_amount_f64(tokens, 6), 1.5);
    }

    #[test]
    fn lamports_round_trip() {
        assert_eq!(sol_to_lamports(lamports_to_sol(1_000_000_000)), 1_000_000_000);
    }
}
