//! Serde configuration objects for preprocessors and postprocessors.
//!
//! Configs deserialize leniently and validate in `build()`, so every
//! construction problem surfaces as [`MedsError::Config`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use meds_model::{BIRTH_CODE, MedsError, Result, ValueColumn};

use crate::matching::{CodeMatcher, MatchingType};
use crate::postprocess::{
    DemographicSortOrder, IntervalDataset, IntervalMode, IntervalToken, NumericFilter,
    Postprocessor, TimeIntervalInserter,
};
use crate::preprocess::{
    AgeEncoder, AgeUnit, AgeVariant, Aggregation, CodeEnrichment, CodeTransform,
    DemographicAggregation, EthosAge, KeyType, Measurement, Preprocessor, StaticColumn,
    StaticDataLoader, StructuralTransform, Template, ValueMethod, ValueTransform,
};

fn default_value_column() -> String {
    ValueColumn::NumericValue.as_str().to_string()
}

fn default_round_decimals() -> usize {
    1
}

fn default_key_type() -> String {
    "string".to_string()
}

fn default_true() -> bool {
    true
}

fn default_invalid_value() -> String {
    crate::preprocess::static_data::DEFAULT_INVALID_VALUE.to_string()
}

fn default_birth_code() -> String {
    BIRTH_CODE.to_string()
}

fn default_time_unit() -> String {
    "years".to_string()
}

fn default_num_quantiles() -> u32 {
    10
}

fn default_age_prefix() -> String {
    "AGE_".to_string()
}

fn parse_value_column(value: &str) -> Result<ValueColumn> {
    ValueColumn::parse(value).ok_or_else(|| {
        MedsError::config(format!(
            "value_column must be numeric_value or text_value; got '{value}'"
        ))
    })
}

fn matcher(matching_type: &str, matching_value: &str) -> Result<CodeMatcher> {
    Ok(CodeMatcher::new(
        MatchingType::parse(matching_type)?,
        matching_value,
    ))
}

/// Options shared by every age encoder; variant-specific keys are ignored elsewhere.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgeOptions {
    #[serde(default = "default_birth_code")]
    pub birth_code: String,
    #[serde(default, alias = "keep_meds_birth")]
    pub keep_birth_marker: bool,
    #[serde(default)]
    pub excluded_prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
    #[serde(default = "default_num_quantiles")]
    pub num_quantiles: u32,
    #[serde(default = "default_age_prefix")]
    pub prefix: String,
    #[serde(default = "default_true")]
    pub insert_t1_code: bool,
    #[serde(default = "default_true")]
    pub insert_t2_code: bool,
}

impl Default for AgeOptions {
    fn default() -> Self {
        Self {
            birth_code: default_birth_code(),
            keep_birth_marker: false,
            excluded_prefixes: None,
            decimals: 0,
            time_unit: default_time_unit(),
            num_quantiles: default_num_quantiles(),
            prefix: default_age_prefix(),
            insert_t1_code: true,
            insert_t2_code: true,
        }
    }
}

impl AgeOptions {
    fn build(&self, variant: AgeVariant) -> AgeEncoder {
        let mut encoder = AgeEncoder::new(variant);
        encoder.birth_code.clone_from(&self.birth_code);
        encoder.keep_birth_marker = self.keep_birth_marker;
        if let Some(prefixes) = &self.excluded_prefixes {
            encoder.excluded_prefixes.clone_from(prefixes);
        }
        encoder
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasurementConfig {
    pub token_pattern: String,
    pub value_column: String,
    pub aggregation: String,
    pub num_bins: usize,
    #[serde(default)]
    pub token_prefix: String,
    #[serde(default = "default_true")]
    pub insert_code: bool,
    #[serde(default)]
    pub remove_original_tokens: bool,
    #[serde(default)]
    pub bin_labels: Option<Vec<String>>,
}

impl MeasurementConfig {
    fn build(&self) -> Result<Measurement> {
        Ok(Measurement {
            token_pattern: self.token_pattern.clone(),
            value_column: parse_value_column(&self.value_column)?,
            aggregation: Aggregation::parse(&self.aggregation)?,
            num_bins: self.num_bins,
            token_prefix: self.token_prefix.clone(),
            insert_code: self.insert_code,
            remove_original_tokens: self.remove_original_tokens,
            bin_labels: self.bin_labels.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StaticColumnConfig {
    pub column_name: String,
    pub code_template: String,
    #[serde(default)]
    pub valid_values: Option<Vec<String>>,
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
    #[serde(default = "default_invalid_value")]
    pub map_invalids_to: String,
    #[serde(default)]
    pub value_prefix: String,
    #[serde(default = "default_true")]
    pub insert_code: bool,
}

impl StaticColumnConfig {
    fn build(&self) -> StaticColumn {
        StaticColumn {
            column_name: self.column_name.clone(),
            code_template: self.code_template.clone(),
            valid_values: self.valid_values.clone(),
            mappings: self
                .mappings
                .iter()
                .map(|(from, to)| (from.trim().to_uppercase(), to.clone()))
                .collect(),
            map_invalids_to: self.map_invalids_to.clone(),
            value_prefix: self.value_prefix.clone(),
            insert_code: self.insert_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreprocessorConfig {
    QuantileBin {
        matching_type: String,
        matching_value: String,
        #[serde(default = "default_value_column")]
        value_column: String,
        k: usize,
    },
    #[serde(rename = "quantile_bin_3level")]
    QuantileBinThreeLevel {
        matching_type: String,
        matching_value: String,
        #[serde(default = "default_value_column")]
        value_column: String,
    },
    RoundNumeric {
        matching_type: String,
        matching_value: String,
        #[serde(default = "default_value_column")]
        value_column: String,
        #[serde(default = "default_round_decimals")]
        decimals: usize,
    },
    CodeTruncation {
        matching_type: String,
        matching_value: String,
    },
    CodeEnrichment {
        matching_type: String,
        matching_value: String,
        lookup_file: PathBuf,
        template: String,
        code_column: String,
        #[serde(default = "default_key_type")]
        key_type: String,
        #[serde(default)]
        additional_filters: BTreeMap<String, String>,
    },
    DataReshaping,
    BinnedAge(AgeOptions),
    DecimalAge(AgeOptions),
    RawAge(AgeOptions),
    SimpleAge(AgeOptions),
    EthosQuantileAge(AgeOptions),
    DemographicAggregation {
        measurements: Vec<MeasurementConfig>,
    },
    LoadStaticData {
        #[serde(alias = "csv_filepath")]
        csv_path: PathBuf,
        subject_id_column: String,
        columns: Vec<StaticColumnConfig>,
    },
}

impl PreprocessorConfig {
    pub fn build(&self) -> Result<Preprocessor> {
        let preprocessor = match self {
            Self::QuantileBin {
                matching_type,
                matching_value,
                value_column,
                k,
            } => ValueTransform::new(
                matcher(matching_type, matching_value)?,
                parse_value_column(value_column)?,
                ValueMethod::QuantileBin { k: *k },
            )?
            .into(),
            Self::QuantileBinThreeLevel {
                matching_type,
                matching_value,
                value_column,
            } => ValueTransform::new(
                matcher(matching_type, matching_value)?,
                parse_value_column(value_column)?,
                ValueMethod::ThreeLevel,
            )?
            .into(),
            Self::RoundNumeric {
                matching_type,
                matching_value,
                value_column,
                decimals,
            } => ValueTransform::new(
                matcher(matching_type, matching_value)?,
                parse_value_column(value_column)?,
                ValueMethod::Round {
                    decimals: *decimals,
                },
            )?
            .into(),
            Self::CodeTruncation {
                matching_type,
                matching_value,
            } => CodeTransform::Truncation(matcher(matching_type, matching_value)?).into(),
            Self::CodeEnrichment {
                matching_type,
                matching_value,
                lookup_file,
                template,
                code_column,
                key_type,
                additional_filters,
            } => CodeTransform::Enrichment(CodeEnrichment::new(
                matcher(matching_type, matching_value)?,
                lookup_file,
                Template::parse(template)?,
                code_column,
                KeyType::parse(key_type)?,
                additional_filters.clone(),
            ))
            .into(),
            Self::DataReshaping => StructuralTransform::DataReshaping.into(),
            Self::BinnedAge(options) => age(options.build(AgeVariant::Binned)),
            Self::DecimalAge(options) => age(options.build(AgeVariant::Decimal)),
            Self::RawAge(options) => age(options.build(AgeVariant::Raw {
                decimals: options.decimals,
            })),
            Self::SimpleAge(options) => age(options.build(AgeVariant::Simple)),
            Self::EthosQuantileAge(options) => {
                let ethos = EthosAge::new(
                    AgeUnit::parse(&options.time_unit)?,
                    options.num_quantiles,
                    options.prefix.clone(),
                    options.insert_t1_code,
                    options.insert_t2_code,
                )?;
                age(options.build(AgeVariant::Ethos(ethos)))
            }
            Self::DemographicAggregation { measurements } => {
                let measurements = measurements
                    .iter()
                    .map(MeasurementConfig::build)
                    .collect::<Result<Vec<_>>>()?;
                StructuralTransform::DemographicAggregation(DemographicAggregation::new(
                    measurements,
                )?)
                .into()
            }
            Self::LoadStaticData {
                csv_path,
                subject_id_column,
                columns,
            } => StructuralTransform::StaticData(StaticDataLoader::new(
                csv_path,
                subject_id_column,
                columns.iter().map(StaticColumnConfig::build).collect(),
            )?)
            .into(),
        };
        Ok(preprocessor)
    }
}

fn age(encoder: AgeEncoder) -> Preprocessor {
    StructuralTransform::Age(encoder).into()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntervalTokenConfig {
    pub name: String,
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostprocessorConfig {
    TimeInterval {
        #[serde(default)]
        interval_tokens: Vec<IntervalTokenConfig>,
        #[serde(default)]
        dynamic: bool,
        #[serde(default)]
        dataset: Option<String>,
    },
    DemographicSortOrder {
        token_patterns: Vec<String>,
    },
    RemoveNumeric,
}

impl PostprocessorConfig {
    pub fn build(&self) -> Result<Postprocessor> {
        let postprocessor = match self {
            Self::TimeInterval {
                interval_tokens,
                dynamic,
                dataset,
            } => {
                let mode = if *dynamic {
                    let dataset = dataset.as_deref().ok_or_else(|| {
                        MedsError::config("dynamic time intervals require a dataset")
                    })?;
                    IntervalMode::Dynamic(IntervalDataset::parse(dataset)?)
                } else {
                    IntervalMode::Table(
                        interval_tokens
                            .iter()
                            .map(|t| IntervalToken::new(t.name.clone(), t.min, t.max))
                            .collect(),
                    )
                };
                Postprocessor::TimeInterval(TimeIntervalInserter::new(mode)?)
            }
            Self::DemographicSortOrder { token_patterns } => Postprocessor::DemographicSortOrder(
                DemographicSortOrder::new(token_patterns.clone()),
            ),
            Self::RemoveNumeric => Postprocessor::RemoveNumeric(NumericFilter::new()?),
        };
        Ok(postprocessor)
    }
}

/// A whole transform chain as written in a TOML document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub preprocessors: Vec<PreprocessorConfig>,
    #[serde(default)]
    pub postprocessors: Vec<PostprocessorConfig>,
}

impl TransformConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| MedsError::config(err.to_string()))
    }

    pub fn build_preprocessors(&self) -> Result<Vec<Preprocessor>> {
        self.preprocessors
            .iter()
            .map(PreprocessorConfig::build)
            .collect()
    }

    pub fn build_postprocessors(&self) -> Result<Vec<Postprocessor>> {
        self.postprocessors
            .iter()
            .map(PostprocessorConfig::build)
            .collect()
    }
}
