pub mod logging;
pub mod time;

pub use time::format_time;

/// Reads a boolean switch from the environment (`1` or `true`).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
