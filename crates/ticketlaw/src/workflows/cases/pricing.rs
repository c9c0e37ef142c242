//! Flat-fee quote table, in cents.

use super::domain::{ClientInfo, ViolationType};

const STANDARD_CENTS: u64 = 24_900;
const DUI_CENTS: u64 = 49_900;
const RECKLESS_CENTS: u64 = 34_900;
const CDL_CENTS: u64 = 29_900;

/// Quote a flat defense fee for a violation.
///
/// DUI and reckless driving price on the violation alone; the CDL premium
/// only applies to the remaining violation types.
pub fn quote(violation: ViolationType, client: &ClientInfo) -> u64 {
    match violation {
        ViolationType::Dui => DUI_CENTS,
        ViolationType::RecklessDriving => RECKLESS_CENTS,
        _ if client.is_cdl_driver => CDL_CENTS,
        _ => STANDARD_CENTS,
    }
}
