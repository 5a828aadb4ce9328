//! Algorithm construction from parameter sets.
//!
//! The `Class` parameter selects the algorithm; the remaining parameters
//! are read with strict types. Every problem is reported before the first
//! event is processed.

use crate::hf_time_check::HfSimpleTimeCheck;
use crate::method0::{SimpleHbheAlgo, SimpleHbheConfig};
use calreco_core::{ConfigError, ParameterSet};

/// Class name of the Method 0 algorithm.
pub const SIMPLE_HBHE_CLASS: &str = "SimpleHBHEPhase1Algo";

/// Class name of the forward anode combination.
pub const HF_SIMPLE_TIME_CHECK_CLASS: &str = "HFSimpleTimeCheck";

/// A configured reconstruction algorithm.
#[derive(Debug)]
pub enum Algorithm {
    /// Method 0 for barrel and endcap waveforms.
    SimpleHbhe(SimpleHbheAlgo),
    /// Forward anode combination.
    HfSimpleTimeCheck(HfSimpleTimeCheck),
}

impl Algorithm {
    /// Class name the algorithm was built from.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::SimpleHbhe(_) => SIMPLE_HBHE_CLASS,
            Self::HfSimpleTimeCheck(_) => HF_SIMPLE_TIME_CHECK_CLASS,
        }
    }
}

fn class_of(ps: &ParameterSet) -> Result<&str, ConfigError> {
    ps.get_string("Class")
}

fn expect_class(ps: &ParameterSet, expected: &str) -> Result<(), ConfigError> {
    let class = class_of(ps)?;
    if class == expected {
        Ok(())
    } else {
        Err(ConfigError::UnknownAlgorithm(class.to_string()))
    }
}

/// Builds any known algorithm from `ps`.
///
/// # Errors
/// Unknown class, missing or mistyped parameters, or invalid values.
pub fn parse_algorithm(ps: &ParameterSet) -> Result<Algorithm, ConfigError> {
    match class_of(ps)? {
        SIMPLE_HBHE_CLASS => parse_hbhe_algorithm(ps).map(Algorithm::SimpleHbhe),
        HF_SIMPLE_TIME_CHECK_CLASS => parse_hf_algorithm(ps).map(Algorithm::HfSimpleTimeCheck),
        other => Err(ConfigError::UnknownAlgorithm(other.to_string())),
    }
}

/// Reads the Method 0 configuration from `ps`.
///
/// `firstSampleShift`, `samplesToAdd` and `phaseNS` are required;
/// `correctForPhaseContainment` defaults to true and
/// `applySpecialCorrections` to false.
///
/// # Errors
/// Missing or mistyped parameters, or a non-positive `samplesToAdd`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_hbhe_config(ps: &ParameterSet) -> Result<SimpleHbheConfig, ConfigError> {
    let samples_to_add = ps.get_i32("samplesToAdd")?;
    if samples_to_add <= 0 {
        return Err(ConfigError::InvalidValue {
            name: "samplesToAdd".to_string(),
            reason: format!("must be positive, got {samples_to_add}"),
        });
    }
    Ok(SimpleHbheConfig {
        first_sample_shift: ps.get_i32("firstSampleShift")?,
        samples_to_add: samples_to_add as u32,
        phase_ns: ps.get_double("phaseNS")? as f32,
        correct_for_containment: ps.get_bool_or("correctForPhaseContainment", true)?,
        apply_special_corrections: ps.get_bool_or("applySpecialCorrections", false)?,
    })
}

/// Builds the Method 0 algorithm.
///
/// # Errors
/// See [`parse_hbhe_config`]; a class other than
/// [`SIMPLE_HBHE_CLASS`] is an unknown algorithm.
pub fn parse_hbhe_algorithm(ps: &ParameterSet) -> Result<SimpleHbheAlgo, ConfigError> {
    expect_class(ps, SIMPLE_HBHE_CLASS)?;
    let algo = SimpleHbheAlgo::new(parse_hbhe_config(ps)?)?;
    log::debug!("configured {SIMPLE_HBHE_CLASS}: {:?}", algo.config());
    Ok(algo)
}

/// Builds the forward anode combination.
///
/// # Errors
/// A class other than [`HF_SIMPLE_TIME_CHECK_CLASS`], missing or mistyped
/// `tlimits` / `energyWeights`, or arrays without 4 and 18 elements.
pub fn parse_hf_algorithm(ps: &ParameterSet) -> Result<HfSimpleTimeCheck, ConfigError> {
    expect_class(ps, HF_SIMPLE_TIME_CHECK_CLASS)?;
    let tlimits = ps.get_doubles_exact("tlimits", 4)?;
    let weights = ps.get_doubles_exact("energyWeights", 18)?;
    HfSimpleTimeCheck::from_flat(tlimits, weights)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    fn hbhe() -> ParameterSet {
        ParameterSet::new()
            .with("Class", SIMPLE_HBHE_CLASS)
            .with("firstSampleShift", -1_i32)
            .with("samplesToAdd", 3_i32)
            .with("phaseNS", 6.0)
    }

    fn hf() -> ParameterSet {
        ParameterSet::new()
            .with("Class", HF_SIMPLE_TIME_CHECK_CLASS)
            .with("tlimits", vec![-1000.0, 1000.0, -1000.0, 1000.0])
            .with("energyWeights", vec![1.0; 18])
    }

    #[test]
    fn test_parse_hbhe() {
        let algo = parse_hbhe_algorithm(&hbhe()).unwrap();
        let config = algo.config();
        assert_eq!(config.first_sample_shift, -1);
        assert_eq!(config.samples_to_add, 3);
        assert_eq!(config.phase_ns, 6.0);
        assert!(config.correct_for_containment);
        assert!(!config.apply_special_corrections);
    }

    #[test]
    fn test_parse_hbhe_flags() {
        let ps = hbhe()
            .with("correctForPhaseContainment", false)
            .with("applySpecialCorrections", true);
        let config = parse_hbhe_config(&ps).unwrap();
        assert!(!config.correct_for_containment);
        assert!(config.apply_special_corrections);
    }

    #[test]
    fn test_integer_phase_accepted() {
        let ps = hbhe().with("phaseNS", 4_i32);
        assert_eq!(parse_hbhe_config(&ps).unwrap().phase_ns, 4.0);
    }

    #[test]
    fn test_missing_parameter() {
        let mut ps = ParameterSet::new()
            .with("Class", SIMPLE_HBHE_CLASS)
            .with("firstSampleShift", 0_i32);
        ps.insert("phaseNS", 6.0);
        assert_eq!(
            parse_hbhe_algorithm(&ps).unwrap_err(),
            ConfigError::MissingParameter("samplesToAdd".to_string())
        );
    }

    #[test]
    fn test_wrong_type() {
        let ps = hbhe().with("samplesToAdd", 3.0);
        assert!(matches!(
            parse_hbhe_algorithm(&ps),
            Err(ConfigError::WrongType { .. })
        ));
        let ps = hbhe().with("correctForPhaseContainment", 1_i32);
        assert!(matches!(
            parse_hbhe_algorithm(&ps),
            Err(ConfigError::WrongType { .. })
        ));
    }

    #[test]
    fn test_non_positive_samples() {
        for n in [0_i32, -2] {
            let ps = hbhe().with("samplesToAdd", n);
            assert!(matches!(
                parse_hbhe_algorithm(&ps),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_class() {
        let ps = hbhe().with("Class", "MahiFit");
        assert_eq!(
            parse_algorithm(&ps).unwrap_err(),
            ConfigError::UnknownAlgorithm("MahiFit".to_string())
        );
        assert!(matches!(
            parse_hf_algorithm(&hbhe()),
            Err(ConfigError::UnknownAlgorithm(_))
        ));
        assert_eq!(
            parse_algorithm(&ParameterSet::new()).unwrap_err(),
            ConfigError::MissingParameter("Class".to_string())
        );
    }

    #[test]
    fn test_parse_dispatch() {
        assert_eq!(parse_algorithm(&hbhe()).unwrap().class_name(), SIMPLE_HBHE_CLASS);
        let algo = parse_algorithm(&hf()).unwrap();
        assert_eq!(algo.class_name(), HF_SIMPLE_TIME_CHECK_CLASS);
        assert!(matches!(algo, Algorithm::HfSimpleTimeCheck(_)));
    }

    #[test]
    fn test_hf_lengths() {
        let ps = hf().with("energyWeights", vec![1.0; 9]);
        assert_eq!(
            parse_hf_algorithm(&ps).unwrap_err(),
            ConfigError::WrongLength {
                name: "energyWeights".to_string(),
                expected: 18,
                found: 9
            }
        );
        let ps = hf().with("tlimits", vec![0.0, 1.0]);
        assert!(matches!(
            parse_hf_algorithm(&ps),
            Err(ConfigError::WrongLength { expected: 4, .. })
        ));
    }
}
