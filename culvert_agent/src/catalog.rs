//! The forwarded RPC surface.
//!
//! Calls cross cloud→device, `notify_*` events cross device→cloud, and the
//! upload trigger is handled by the bridge itself. Typed response shapes
//! supply the zero value answered when a forwarded call fails; endpoints
//! whose zero value carries no information use an empty object, action
//! endpoints answer a bare string.

use culvert_core::method::{Flow, MethodTable};
use serde::Serialize;

/// Zero value for endpoints whose failure answer is an empty object.
#[derive(Debug, Default, Serialize)]
struct Empty {}

#[derive(Debug, Default, Serialize)]
struct WebsocketId {
    websocket_id: u64,
}

#[derive(Debug, Default, Serialize)]
struct PrinterInfo {
    state: String,
    state_message: String,
    hostname: String,
    software_version: String,
    cpu_info: String,
}

/// Build the method table the agent exposes across the tunnel.
#[must_use]
pub fn method_table() -> MethodTable {
    use Flow::{CloudToDevice, DeviceToCloud};

    MethodTable::new()
        .call::<Empty>("server.connection.identify", CloudToDevice)
        .call::<WebsocketId>("server.websocket.id", CloudToDevice)
        .call::<PrinterInfo>("printer.info", CloudToDevice)
        .call::<String>("printer.emergency_stop", CloudToDevice)
        .call::<String>("printer.restart", CloudToDevice)
        .call::<String>("printer.firmware_restart", CloudToDevice)
        .call::<Empty>("printer.objects.list", CloudToDevice)
        .call::<Empty>("printer.objects.query", CloudToDevice)
        .call::<Empty>("printer.objects.subscribe", CloudToDevice)
        .call::<Empty>("printer.query_endstops.status", CloudToDevice)
        .call::<Empty>("server.info", CloudToDevice)
        .call::<Empty>("server.config", CloudToDevice)
        .call::<Empty>("server.temperature_store", CloudToDevice)
        .call::<Empty>("server.gcode_store", CloudToDevice)
        .call::<String>("server.restart", CloudToDevice)
        .call::<String>("printer.gcode.script", CloudToDevice)
        .call::<Empty>("printer.gcode.help", CloudToDevice)
        .call::<String>("printer.print.start", CloudToDevice)
        .call::<String>("printer.print.pause", CloudToDevice)
        .call::<String>("printer.print.resume", CloudToDevice)
        .call::<String>("printer.print.cancel", CloudToDevice)
        .call::<Empty>("machine.system_info", CloudToDevice)
        .call::<String>("machine.shutdown", CloudToDevice)
        .call::<String>("machine.reboot", CloudToDevice)
        .call::<String>("machine.services.restart", CloudToDevice)
        .call::<String>("machine.services.stop", CloudToDevice)
        .call::<String>("machine.services.start", CloudToDevice)
        .call::<Empty>("machine.proc_stats", CloudToDevice)
        .call::<Empty>("server.files.list", CloudToDevice)
        .call::<Empty>("server.files.metadata", CloudToDevice)
        .call::<Empty>("server.files.get_directory", CloudToDevice)
        .call::<Empty>("server.files.post_directory", CloudToDevice)
        .call::<Empty>("server.files.delete_directory", CloudToDevice)
        .call::<Empty>("server.files.move", CloudToDevice)
        .call::<Empty>("server.files.copy", CloudToDevice)
        .call::<Empty>("server.files.delete_file", CloudToDevice)
        .call::<Empty>("server.database.list", CloudToDevice)
        .call::<Empty>("server.database.get_item", CloudToDevice)
        .call::<Empty>("server.database.post_item", CloudToDevice)
        .call::<Empty>("server.database.delete_item", CloudToDevice)
        .call::<Empty>("server.job_queue.status", CloudToDevice)
        .call::<Empty>("server.job_queue.post_job", CloudToDevice)
        .call::<Empty>("server.job_queue.delete_job", CloudToDevice)
        .call::<Empty>("server.job_queue.pause", CloudToDevice)
        .call::<Empty>("server.job_queue.start", CloudToDevice)
        .call::<Empty>("server.announcements.list", CloudToDevice)
        .call::<Empty>("server.announcements.update", CloudToDevice)
        .call::<Empty>("server.announcements.dismiss", CloudToDevice)
        .call::<Empty>("server.announcements.feeds", CloudToDevice)
        .call::<Empty>("server.announcements.post_feed", CloudToDevice)
        .call::<Empty>("server.announcements.delete_feed", CloudToDevice)
        .call::<Empty>("machine.update.status", CloudToDevice)
        .call::<String>("machine.update.full", CloudToDevice)
        .call::<String>("machine.update.moonraker", CloudToDevice)
        .call::<String>("machine.update.klipper", CloudToDevice)
        .call::<String>("machine.update.client", CloudToDevice)
        .call::<String>("machine.update.system", CloudToDevice)
        .call::<String>("machine.update.recover", CloudToDevice)
        .call::<Empty>("server.history.list", CloudToDevice)
        .call::<Empty>("server.history.totals", CloudToDevice)
        .call::<Empty>("server.history.reset_totals", CloudToDevice)
        .call::<Empty>("server.history.get_job", CloudToDevice)
        .call::<Empty>("server.history.delete_job", CloudToDevice)
        .notify("notify_gcode_response", DeviceToCloud)
        .notify("notify_status_update", DeviceToCloud)
        .notify("notify_klippy_ready", DeviceToCloud)
        .notify("notify_klippy_shutdown", DeviceToCloud)
        .notify("notify_klippy_disconnected", DeviceToCloud)
        .notify("notify_filelist_changed", DeviceToCloud)
        .notify("notify_update_response", DeviceToCloud)
        .notify("notify_update_refreshed", DeviceToCloud)
        .notify("notify_cpu_throttled", DeviceToCloud)
        .notify("notify_proc_stat_update", DeviceToCloud)
        .notify("notify_history_changed", DeviceToCloud)
        .notify("notify_user_created", DeviceToCloud)
        .notify("notify_user_deleted", DeviceToCloud)
        .notify("notify_service_state_changed", DeviceToCloud)
        .notify("notify_job_queue_changed", DeviceToCloud)
        .upload("cloud.upload")
}
