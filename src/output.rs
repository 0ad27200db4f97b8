use std::io::{self, Write};

use serde::Serialize;

use crate::accidents::AccidentsReport;
use crate::app::HarvestSummary;
use crate::geometry::GeometryReport;
use crate::organize::OrganizeReport;
use crate::weather::WeatherReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(result: &HarvestSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_accidents(result: &AccidentsReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_geometry(result: &GeometryReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_weather(result: &WeatherReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_organize(result: &OrganizeReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
