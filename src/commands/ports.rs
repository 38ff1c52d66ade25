//! Serial port listing

/// List serial ports a device may be attached to
pub fn run_ports() -> Result<(), Box<dyn std::error::Error>> {
    let ports = mspflash_esptool::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    println!("Available serial ports:");
    println!();
    for port in &ports {
        println!("  {}", port.description);
    }
    Ok(())
}
