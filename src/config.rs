use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub init: InitConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of grid rows.
    pub height: usize,
    /// Number of grid columns.
    pub width: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Total number of agents, constant for the whole run.
    pub population: usize,
    /// Initial number of sick agents.
    pub sick: usize,
    /// Initial number of vaccinated agents.
    pub vaccinated: usize,
    /// RNG seed; taken from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Per-sick-neighbor infection probability for healthy agents.
    pub prob_infection: f64,
    /// Per-sick-neighbor infection probability for vaccinated agents.
    pub prob_breakthrough: f64,
    /// Sickness duration in ticks.
    pub sick_duration: u32,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps between trajectory records.
    pub steps_per_save: usize,
    /// Number of records written per trajectory file.
    pub saves_per_file: usize,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.grid.height, 1..=4096).context("invalid grid height")?;
        check_num(self.grid.width, 1..=4096).context("invalid grid width")?;

        let n_cells = self.grid.height * self.grid.width;
        check_num(self.init.population, 1..=n_cells).context("invalid population")?;
        let n_seeded = self.init.sick.checked_add(self.init.vaccinated);
        if n_seeded.is_none_or(|n_seeded| n_seeded > self.init.population) {
            bail!(
                "initial sick ({}) plus vaccinated ({}) agents exceed the population ({})",
                self.init.sick,
                self.init.vaccinated,
                self.init.population
            );
        }

        check_num(self.model.prob_infection, 0.0..=1.0)
            .context("invalid infection probability")?;
        check_num(self.model.prob_breakthrough, 0.0..=1.0)
            .context("invalid breakthrough probability")?;
        check_num(self.model.sick_duration, 1..10_000).context("invalid sickness duration")?;

        check_num(self.output.steps_per_save, 1..10_000)
            .context("invalid number of steps per save")?;
        check_num(self.output.saves_per_file, 1..10_000)
            .context("invalid number of saves per file")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
