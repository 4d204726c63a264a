use crate::config::Config;
use crate::engine::Record;
use crate::model::Health;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

pub trait Obs {
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Per-state health fraction statistics over the saved records.
pub struct HealthFractions {
    sick: TimeSeries,
    vaccinated: TimeSeries,
    healthy: TimeSeries,
}

impl HealthFractions {
    pub fn new() -> Self {
        Self {
            sick: TimeSeries::new(),
            vaccinated: TimeSeries::new(),
            healthy: TimeSeries::new(),
        }
    }
}

impl Obs for HealthFractions {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.sick.push(record.sick_fraction);
        self.vaccinated.push(record.vaccinated_fraction);
        self.healthy
            .push(1.0 - record.sick_fraction - record.vaccinated_fraction);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "health_fractions": {
                "sick": self.sick.report(),
                "vaccinated": self.vaccinated.report(),
                "healthy": self.healthy.report(),
            }
        })
    }
}

/// Largest sick fraction seen and the step it occurred at.
///
/// Reports `null` until the first record arrives.
pub struct PeakSick {
    peak: Option<(f64, usize)>,
}

impl PeakSick {
    pub fn new() -> Self {
        Self { peak: None }
    }
}

impl Obs for PeakSick {
    fn update(&mut self, record: &Record) -> Result<()> {
        if self
            .peak
            .is_none_or(|(fraction, _)| record.sick_fraction > fraction)
        {
            self.peak = Some((record.sick_fraction, record.step));
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "peak_sick": {
                "fraction": self.peak.map(|(fraction, _)| fraction),
                "step": self.peak.map(|(_, step)| step),
            }
        })
    }
}

/// Mean remaining recovery countdown among sick agents.
pub struct SickCountdown {
    acc: Accumulator,
}

impl SickCountdown {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for SickCountdown {
    fn update(&mut self, record: &Record) -> Result<()> {
        let countdowns: Vec<_> = record
            .state
            .agents
            .iter()
            .filter(|agt| agt.health() == Health::Sick)
            .map(|agt| agt.countdown() as f64)
            .collect();
        if !countdowns.is_empty() {
            self.acc
                .add(countdowns.iter().sum::<f64>() / countdowns.len() as f64);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "sick_countdown": self.acc.report() })
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(HealthFractions::new()),
            Box::new(PeakSick::new()),
            Box::new(SickCountdown::new()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.saves_per_file {
            let record = decode::from_read(&mut reader).context("failed to read record")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&record).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, Grid, State};

    fn record(step: usize, sick: f64, vaccinated: f64) -> Record {
        let mut grid = Grid::new(2, 2);
        let agents = vec![
            Agent::new(Health::Sick, 0, 0, 4),
            Agent::new(Health::Healthy, 1, 1, 4),
        ];
        grid.place(0, 0, 0);
        grid.place(1, 1, 1);
        Record {
            step,
            sick_fraction: sick,
            vaccinated_fraction: vaccinated,
            state: State {
                grid,
                agents,
                order: vec![0, 1],
            },
        }
    }

    #[test]
    fn peak_sick_tracks_maximum_and_step() {
        let mut obs = PeakSick::new();
        obs.update(&record(1, 0.1, 0.0)).unwrap();
        obs.update(&record(2, 0.4, 0.1)).unwrap();
        obs.update(&record(3, 0.2, 0.3)).unwrap();

        let report = obs.report();
        assert_eq!(report["peak_sick"]["fraction"], 0.4);
        assert_eq!(report["peak_sick"]["step"], 2);
    }

    #[test]
    fn peak_sick_without_records_reports_null() {
        let report = PeakSick::new().report();
        assert!(report["peak_sick"]["fraction"].is_null());
        assert!(report["peak_sick"]["step"].is_null());
    }

    #[test]
    fn sick_countdown_averages_only_sick_agents() {
        let mut obs = SickCountdown::new();
        obs.update(&record(1, 0.5, 0.0)).unwrap();

        let report = obs.report();
        assert_eq!(report["sick_countdown"]["mean"], 4.0);
    }
}
