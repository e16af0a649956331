use teaready_core::{Config, TempUnit};

/// "4 mins", "2 mins 30 secs" or "45 secs", as the menu shows steep times.
fn steep_label(secs: u16) -> String {
    match (secs / 60, secs % 60) {
        (mins, 0) if secs > 60 => format!("{mins} mins"),
        (mins, rest) if secs > 60 => format!("{mins} mins {rest} secs"),
        _ => format!("{secs} secs"),
    }
}

fn temperature_label(celsius: u8, unit: TempUnit) -> String {
    format!("{}{}", unit.convert(celsius), unit.symbol())
}

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let catalog = config.catalog();
    if json {
        let visible: Vec<_> = catalog.visible().map(|(_, p)| p).collect();
        println!("{}", serde_json::to_string_pretty(&visible)?);
        return Ok(());
    }
    for (index, tea) in catalog.visible() {
        println!(
            "{index}  {:<8} {} ({})",
            tea.name,
            steep_label(tea.default_duration_secs),
            temperature_label(tea.temperature_celsius, config.display.temp_unit)
        );
    }
    Ok(())
}
