use super::constants::LAMPORTS_PER_SOL;

/// Lamports as SOL with four decimals.
pub fn format_sol(lamports: u128) -> String {
    format!("{:.4}", lamports as f64 / LAMPORTS_PER_SOL as f64)
}

/// Token amount without decimals when whole, otherwise with two.
pub fn format_token(smallest_units: u128, decimals: u8) -> String {
    let value = smallest_units as f64 / 10f64.powi(i32::from(decimals));
    if value.fract() == 0.0 { format!("{value:.0}") } else { format!("{value:.2}") }
}

/// Signed amount with an explicit `+`/`-`, e.g. for net profit lines.
///
/// `decimals = None` formats as SOL.
pub fn format_signed_amount(amount: i128, decimals: Option<u8>) -> String {
    let prefix = if amount >= 0 { '+' } else { '-' };
    let magnitude = amount.unsigned_abs();
    let body = match decimals {
        Some(decimals) => format_token(magnitude, decimals),
        None => format_sol(magnitude),
    };
    format!("{prefix}{body}")
}

/// `abcd...wxyz` for an address string.
pub fn truncate_address(address: &str, chars: usize) -> String {
    let count = address.chars().count();
    if count <= chars * 2 {
        return address.to_string();
    }
    let head: String = address.chars().take(chars).collect();
    let tail: String = address.chars().skip(count - chars).collect();
    format!("{head}...{tail}")
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

pub fn token_to_smallest_unit(amount: f64, decimals: u8) -> u64 {
    (amount * 10f64.powi(i32::from(decimals))).round() as u64
}
