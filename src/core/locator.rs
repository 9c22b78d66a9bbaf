use quick_xml::escape::escape;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poller::cancellable;
use super::progress::ProgressSink;
use crate::error::Result;
use crate::xapi::XapiSession;

/// Returned when no member of the device-group has the serial number.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

pub fn show_device_group_cmd(device_group: &str) -> String {
    format!(
        "<show><devicegroups><name>{}</name></devicegroups></show>",
        escape(device_group)
    )
}

/// Look up the hostname of the firewall with `serial_number` among the
/// members of `device_group`.
///
/// The whole member list is scanned before deciding; "serial number not
/// found" is reported at most once, and only when nothing matched.
pub async fn resolve_hostname(
    session: &dyn XapiSession,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    serial_number: &str,
    device_group: &str,
) -> Result<String> {
    progress.step(&format!(
        "checking dg {device_group} to find sn {serial_number}"
    ));

    let cmd = show_device_group_cmd(device_group);
    let reply = cancellable(cancel, session.op(&cmd, None)).await?;
    let devices = reply.devices()?;
    debug!(device_group = %device_group, members = devices.len(), "Device-group members");

    match devices.into_iter().find(|d| d.serial == serial_number) {
        Some(device) => match device.hostname {
            Some(hostname) => {
                info!(serial = %serial_number, hostname = %hostname, "Resolved hostname");
                Ok(hostname)
            }
            None => {
                warn!(serial = %serial_number, "Device has no recorded hostname");
                Ok(UNKNOWN_HOSTNAME.to_string())
            }
        },
        None => {
            progress.step("serial number not found");
            Ok(UNKNOWN_HOSTNAME.to_string())
        }
    }
}
