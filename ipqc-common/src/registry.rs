//! Stage configuration registry
//!
//! Maps a stage id to the parameters whose observation shape depends on the
//! production line, and to the physical sub-units each line has for that
//! stage. Stages without line-dependent parameters have no entry and are
//! built unmodified.
//!
//! When a line is missing from a stage's mapping, or the mapping holds a
//! stringer topology where a flat unit list is needed, the stage's row in
//! the fallback table decides the units. The rows are data rather than a
//! rule because the observed defaults differ per stage.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{self, ParameterShape};
use crate::error::ShapeError;
use crate::line::ProductionLine;
use crate::shape::ShapeKind;

/// Stage-5 stringer layout for one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringerTopology {
    /// Every stringer on the line, in grid order
    pub stringers: Vec<u32>,
    /// Stringers drawn in the upper grid row
    pub top_half: Vec<u32>,
    /// Stringers drawn in the lower grid row
    pub bottom_half: Vec<u32>,
}

/// Sub-units a line has for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitLayout {
    /// Ordered unit labels ("Line-3", "Laminator-5", ...)
    Units(Vec<String>),
    /// Stringer topology (stage 5)
    Stringers(StringerTopology),
}

/// Units resolved for one (stage, line, shape) request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedUnits {
    Units(Vec<String>),
    Topology(StringerTopology),
}

/// Registry entry for a stage with line-dependent parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub line_dependent_parameter_ids: BTreeSet<String>,
    pub line_mapping: BTreeMap<ProductionLine, UnitLayout>,
}

impl StageConfig {
    pub fn is_line_dependent(&self, parameter_id: &str) -> bool {
        self.line_dependent_parameter_ids.contains(parameter_id)
    }
}

/// Registry of per-stage line configuration
#[derive(Debug, Clone, Default)]
pub struct StageConfigRegistry {
    configs: BTreeMap<u32, StageConfig>,
    fallbacks: BTreeMap<u32, Vec<String>>,
    no_config_fallback: Vec<String>,
}

static BUILTIN: Lazy<StageConfigRegistry> = Lazy::new(StageConfigRegistry::from_catalog);

/// Unit families shared across stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitFamily {
    Lines,
    /// Only line I is declared; line II resolves through the fallback table
    LinesLineIOnly,
    Laminators,
    Trimmers,
    Stringers,
}

const STAGE_FAMILIES: &[(u32, UnitFamily)] = &[
    (2, UnitFamily::Lines),
    (3, UnitFamily::Lines),
    (5, UnitFamily::Stringers),
    (6, UnitFamily::Lines),
    (7, UnitFamily::Lines),
    (8, UnitFamily::Lines),
    (10, UnitFamily::Laminators),
    (11, UnitFamily::Lines),
    (12, UnitFamily::Trimmers),
    (13, UnitFamily::Lines),
    (16, UnitFamily::Lines),
    (17, UnitFamily::Lines),
    (18, UnitFamily::LinesLineIOnly),
    (19, UnitFamily::Lines),
    (20, UnitFamily::Lines),
    (22, UnitFamily::Lines),
    (23, UnitFamily::Lines),
    (24, UnitFamily::Lines),
];

const LINE_II_LINES: &[&str] = &["Line-3", "Line-4"];

/// Per-stage fallback units; stages absent here use [`NO_CONFIG_FALLBACK`]
const FALLBACK_UNITS: &[(u32, &[&str])] = &[
    (2, LINE_II_LINES),
    (3, LINE_II_LINES),
    (5, LINE_II_LINES),
    (6, LINE_II_LINES),
    (7, LINE_II_LINES),
    (8, LINE_II_LINES),
    (
        10,
        &["Laminator-5", "Laminator-6", "Laminator-7", "Laminator-8"],
    ),
    (11, LINE_II_LINES),
    (12, &["Auto trimming - 3", "Auto trimming - 4"]),
    (13, LINE_II_LINES),
    (16, LINE_II_LINES),
    (17, LINE_II_LINES),
    (19, LINE_II_LINES),
    (20, LINE_II_LINES),
    (22, LINE_II_LINES),
    (23, LINE_II_LINES),
    (24, LINE_II_LINES),
];

const NO_CONFIG_FALLBACK: &[&str] = LINE_II_LINES;

fn numbered(prefix: &str, ids: impl IntoIterator<Item = u32>) -> Vec<String> {
    ids.into_iter().map(|n| format!("{}{}", prefix, n)).collect()
}

impl UnitFamily {
    fn mapping(self) -> BTreeMap<ProductionLine, UnitLayout> {
        let mut map = BTreeMap::new();
        match self {
            UnitFamily::Lines => {
                map.insert(ProductionLine::I, UnitLayout::Units(numbered("Line-", 1..=2)));
                map.insert(ProductionLine::II, UnitLayout::Units(numbered("Line-", 3..=4)));
            }
            UnitFamily::LinesLineIOnly => {
                map.insert(ProductionLine::I, UnitLayout::Units(numbered("Line-", 1..=2)));
            }
            UnitFamily::Laminators => {
                map.insert(ProductionLine::I, UnitLayout::Units(numbered("Laminator-", 1..=4)));
                map.insert(ProductionLine::II, UnitLayout::Units(numbered("Laminator-", 5..=8)));
            }
            UnitFamily::Trimmers => {
                map.insert(
                    ProductionLine::I,
                    UnitLayout::Units(numbered("Auto trimming - ", 1..=2)),
                );
                map.insert(
                    ProductionLine::II,
                    UnitLayout::Units(numbered("Auto trimming - ", 3..=4)),
                );
            }
            UnitFamily::Stringers => {
                map.insert(
                    ProductionLine::I,
                    UnitLayout::Stringers(StringerTopology {
                        stringers: (1..=6).collect(),
                        top_half: (1..=3).collect(),
                        bottom_half: (4..=6).collect(),
                    }),
                );
                map.insert(
                    ProductionLine::II,
                    UnitLayout::Stringers(StringerTopology {
                        stringers: (7..=12).collect(),
                        top_half: (7..=9).collect(),
                        bottom_half: (10..=12).collect(),
                    }),
                );
            }
        }
        map
    }
}

impl StageConfigRegistry {
    /// Registry built from the stage catalog and the plant's unit tables
    pub fn builtin() -> &'static StageConfigRegistry {
        &BUILTIN
    }

    /// Empty registry with the given no-config fallback
    pub fn new(no_config_fallback: Vec<String>) -> Self {
        Self {
            configs: BTreeMap::new(),
            fallbacks: BTreeMap::new(),
            no_config_fallback,
        }
    }

    fn from_catalog() -> Self {
        let mut registry = Self::new(NO_CONFIG_FALLBACK.iter().map(|s| s.to_string()).collect());

        for (stage_id, family) in STAGE_FAMILIES {
            let Some(stage) = catalog::stage_spec(*stage_id) else {
                continue;
            };
            let line_dependent: BTreeSet<String> = stage
                .parameters
                .iter()
                .filter(|p| matches!(p.shape, ParameterShape::LineDependent(_)))
                .map(|p| p.id.to_string())
                .collect();
            if line_dependent.is_empty() {
                continue;
            }
            registry = registry.with_config(
                *stage_id,
                StageConfig {
                    line_dependent_parameter_ids: line_dependent,
                    line_mapping: family.mapping(),
                },
            );
        }

        for (stage_id, units) in FALLBACK_UNITS {
            registry =
                registry.with_fallback(*stage_id, units.iter().map(|s| s.to_string()).collect());
        }

        registry
    }

    /// Add or replace a stage entry
    pub fn with_config(mut self, stage_id: u32, config: StageConfig) -> Self {
        self.configs.insert(stage_id, config);
        self
    }

    /// Add or replace a stage's fallback units
    pub fn with_fallback(mut self, stage_id: u32, units: Vec<String>) -> Self {
        self.fallbacks.insert(stage_id, units);
        self
    }

    /// Entry for a stage, or None when the stage is used unmodified
    pub fn get_config(&self, stage_id: u32) -> Option<&StageConfig> {
        self.configs.get(&stage_id)
    }

    /// Stage ids that have line-dependent parameters
    pub fn line_dependent_stage_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.configs.keys().copied()
    }

    /// Fallback unit list for a stage
    pub fn fallback_units(&self, stage_id: u32) -> &[String] {
        self.fallbacks
            .get(&stage_id)
            .unwrap_or(&self.no_config_fallback)
    }

    /// Flat unit list for a stage on a line
    pub fn units_for(&self, stage_id: u32, line: ProductionLine) -> Vec<String> {
        match self
            .get_config(stage_id)
            .and_then(|config| config.line_mapping.get(&line))
        {
            Some(UnitLayout::Units(units)) => units.clone(),
            Some(UnitLayout::Stringers(_)) | None => {
                tracing::debug!(stage_id, %line, "using fallback unit list");
                self.fallback_units(stage_id).to_vec()
            }
        }
    }

    /// Stringer topology for a stage on a line
    pub fn topology_for(
        &self,
        stage_id: u32,
        line: ProductionLine,
    ) -> Result<&StringerTopology, ShapeError> {
        let topology = match self
            .get_config(stage_id)
            .and_then(|config| config.line_mapping.get(&line))
        {
            Some(UnitLayout::Stringers(topology)) => topology,
            Some(UnitLayout::Units(_)) | None => {
                return Err(ShapeError::MissingTopology { stage_id, line })
            }
        };

        for (field, ids) in [
            ("stringers", &topology.stringers),
            ("topHalf", &topology.top_half),
            ("bottomHalf", &topology.bottom_half),
        ] {
            if ids.is_empty() {
                return Err(ShapeError::IncompleteTopology {
                    stage_id,
                    line,
                    field,
                });
            }
        }
        Ok(topology)
    }

    /// Units or topology a shape needs for a stage on a line
    pub fn resolve(
        &self,
        stage_id: u32,
        line: ProductionLine,
        kind: &ShapeKind,
    ) -> Result<ResolvedUnits, ShapeError> {
        match kind {
            ShapeKind::Stringer(_) => self
                .topology_for(stage_id, line)
                .map(|topology| ResolvedUnits::Topology(topology.clone())),
            ShapeKind::Unit(_) => Ok(ResolvedUnits::Units(self.units_for(stage_id, line))),
        }
    }

    /// Top and bottom grid rows of the stringer layout, as stringer keys
    pub fn grid_halves(
        &self,
        stage_id: u32,
        line: ProductionLine,
    ) -> Result<(Vec<String>, Vec<String>), ShapeError> {
        let topology = self.topology_for(stage_id, line)?;
        let keys = |ids: &[u32]| -> Vec<String> {
            ids.iter().map(|id| crate::shape::stringer_key(*id)).collect()
        };
        Ok((keys(&topology.top_half), keys(&topology.bottom_half)))
    }
}
