use crate::model::{Health, State};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufWriter, path::Path};

/// Per-tick time series of the aggregate health fractions.
///
/// Lives inside the engine and is serialized with it, so a resumed run
/// keeps appending to one continuous series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    sick_fractions: Vec<f64>,
    vaccinated_fractions: Vec<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sick_fractions: Vec::new(),
            vaccinated_fractions: Vec::new(),
        }
    }

    /// Append the current sick and vaccinated fractions.
    pub fn record(&mut self, state: &State) {
        self.sick_fractions.push(state.health_fraction(Health::Sick));
        self.vaccinated_fractions
            .push(state.health_fraction(Health::Vaccinated));
    }

    pub fn sick_fractions(&self) -> &[f64] {
        &self.sick_fractions
    }

    pub fn vaccinated_fractions(&self) -> &[f64] {
        &self.vaccinated_fractions
    }

    /// Save the two series as JSON for an external plotting tool.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).context("failed to serialize metrics")?;
        Ok(())
    }
}
