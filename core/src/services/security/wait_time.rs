//! Human-readable rendering of lockout wait times.

const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Render a remaining block time in the largest fitting unit, rounded up
///
/// The output is shown to users verbatim, so the unit names are fixed:
/// `segundos`, `minutos`, `horas`, `días`.
///
/// # Example
/// ```
/// use tm_core::services::security::format_block_time;
///
/// assert_eq!(format_block_time(59_000), "59 segundos");
/// assert_eq!(format_block_time(90_000), "2 minutos");
/// ```
pub fn format_block_time(ms: u64) -> String {
    if ms < MINUTE_MS {
        format!("{} segundos", ms.div_ceil(SECOND_MS))
    } else if ms < HOUR_MS {
        format!("{} minutos", ms.div_ceil(MINUTE_MS))
    } else if ms < DAY_MS {
        format!("{} horas", ms.div_ceil(HOUR_MS))
    } else {
        format!("{} días", ms.div_ceil(DAY_MS))
    }
}
