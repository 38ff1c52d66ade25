//! Probe command implementation

use indicatif::{ProgressBar, ProgressStyle};
use mspflash_core::{probe, Confidence, DeviceInfo, ToolRunner};
use std::time::Duration;

/// Identify the device on `port` behind a spinner
pub fn probe_with_spinner<R: ToolRunner + ?Sized>(
    runner: &mut R,
    port: &str,
) -> Result<DeviceInfo, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Probing device on {}...", port));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = probe::probe(runner, port);
    pb.finish_and_clear();
    Ok(result?)
}

/// Run the probe command
pub fn run_probe<R: ToolRunner + ?Sized>(
    runner: &mut R,
    port: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = probe_with_spinner(runner, port)?;
    print_device_info(&info);
    Ok(())
}

pub fn print_device_info(info: &DeviceInfo) {
    println!("Device Information");
    println!("==================");
    println!();
    println!("Chip:            {}", info.chip_model);
    println!("MAC address:     {}", info.mac_address);
    println!(
        "Flash size:      {} ({})",
        info.flash_capacity,
        match info.confidence {
            Confidence::Measured => "measured",
            Confidence::Estimated => "estimated",
        }
    );
    println!("Firmware:        {} package", info.capacity_bucket());

    if info.is_degraded() {
        println!();
        println!("Note: the device did not fully identify itself.");
        println!("Check the cable and hold BOOT while connecting if probing keeps failing.");
    }
}
