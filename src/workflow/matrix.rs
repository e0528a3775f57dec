//! Matrix expansion
//!
//! A job may declare a matrix of named axes. The job is expanded into one
//! independent instance per combination of axis values (full Cartesian
//! product minus an explicit exclusion list). Axis declaration order is
//! preserved so instance names and logs stay readable.

use super::Environment;
use super::definition::Job;
use super::errors::WorkflowError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A single axis of a matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixAxis {
    /// Axis name
    pub name: String,
    /// Ordered values for this axis
    pub values: Vec<String>,
}

/// A matrix of named axes, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Matrix {
    /// Axes in declaration order
    pub axes: Vec<MatrixAxis>,
}

impl Matrix {
    /// Creates an empty matrix
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an axis
    #[must_use]
    pub fn axis(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.axes.push(MatrixAxis {
            name: name.into(),
            values,
        });
        self
    }

    /// Returns true if no axes are declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of combinations the full Cartesian product yields
    #[must_use]
    pub fn combination_count(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Generates the Cartesian product of all axes
    ///
    /// Ordering is lexicographic by axis declaration order, then by value
    /// order within each axis.
    #[must_use]
    pub fn combinations(&self) -> Vec<Vec<(String, String)>> {
        if self.axes.is_empty() {
            return vec![];
        }

        let mut combinations = vec![vec![]];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(combinations.len() * axis.values.len());
            for combo in &combinations {
                for value in &axis.values {
                    let mut extended = combo.clone();
                    extended.push((axis.name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            combinations = next;
        }
        combinations
    }
}

// Deserialized from a plain mapping of axis name to value list, preserving
// declaration order. Scalar values are coerced to strings.
impl<'de> Deserialize<'de> for Matrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MatrixVisitor;

        impl<'de> Visitor<'de> for MatrixVisitor {
            type Value = Matrix;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of axis names to value lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Matrix, A::Error> {
                let mut axes = Vec::new();
                while let Some((name, values)) = map.next_entry::<String, Vec<AxisValue>>()? {
                    axes.push(MatrixAxis {
                        name,
                        values: values.into_iter().map(String::from).collect(),
                    });
                }
                Ok(Matrix { axes })
            }
        }

        deserializer.deserialize_map(MatrixVisitor)
    }
}

impl Serialize for Matrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.axes.len()))?;
        for axis in &self.axes {
            map.serialize_entry(&axis.name, &axis.values)?;
        }
        map.end()
    }
}

/// Axis values may be written as bare scalars in YAML
#[derive(Deserialize)]
#[serde(untagged)]
enum AxisValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<AxisValue> for String {
    fn from(value: AxisValue) -> Self {
        match value {
            AxisValue::Bool(b) => b.to_string(),
            AxisValue::Int(i) => i.to_string(),
            AxisValue::Float(f) => f.to_string(),
            AxisValue::Text(t) => t,
        }
    }
}

/// Execution strategy for a job's matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Strategy {
    /// Matrix axes
    #[serde(default)]
    pub matrix: Matrix,

    /// Combinations to exclude from the product
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<HashMap<String, String>>,

    /// When true (default), a failing instance cancels its not-yet-terminal
    /// siblings within the same job
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

fn default_fail_fast() -> bool {
    true
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            matrix: Matrix::new(),
            exclude: Vec::new(),
            fail_fast: true,
        }
    }
}

impl Strategy {
    fn is_excluded(&self, combo: &[(String, String)]) -> bool {
        self.exclude.iter().any(|rule| {
            !rule.is_empty()
                && rule
                    .iter()
                    .all(|(key, value)| combo.iter().any(|(k, v)| k == key && v == value))
        })
    }
}

/// A job bound to one concrete combination of matrix values
///
/// Instances are independent: each owns its own copy of the step sequence
/// and shares no mutable state with siblings.
#[derive(Debug, Clone)]
pub struct JobInstance {
    /// Name of the owning job
    pub job_name: String,
    /// Instance name, e.g. `test (3.9)` for matrix cells
    pub name: String,
    /// Axis values bound to this instance, in axis declaration order
    pub combination: Vec<(String, String)>,
    /// The job's definition (env, steps, timeouts)
    pub job: Job,
}

impl JobInstance {
    /// Environment carrying this instance's axis values
    ///
    /// Each axis value is published as `MATRIX_<AXIS>`, uppercased with
    /// non-alphanumeric characters mapped to underscores.
    #[must_use]
    pub fn matrix_env(&self) -> Environment {
        let mut env = Environment::new();
        for (axis, value) in &self.combination {
            let key: String = axis
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect();
            env = env.set(format!("MATRIX_{key}"), value.clone());
        }
        env
    }
}

impl fmt::Display for JobInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Expands a job into its matrix instances
///
/// A job without a matrix yields exactly one instance carrying the job's
/// own step sequence.
///
/// # Errors
///
/// Returns [`WorkflowError::InvalidMatrix`] if any declared axis has zero
/// values.
pub fn expand(job_name: &str, job: &Job) -> Result<Vec<JobInstance>, WorkflowError> {
    let Some(strategy) = job.strategy.as_ref() else {
        return Ok(vec![JobInstance {
            job_name: job_name.to_string(),
            name: job_name.to_string(),
            combination: Vec::new(),
            job: job.clone(),
        }]);
    };

    for axis in &strategy.matrix.axes {
        if axis.values.is_empty() {
            return Err(WorkflowError::InvalidMatrix {
                job: job_name.to_string(),
                axis: axis.name.clone(),
            });
        }
    }

    if strategy.matrix.is_empty() {
        return Ok(vec![JobInstance {
            job_name: job_name.to_string(),
            name: job_name.to_string(),
            combination: Vec::new(),
            job: job.clone(),
        }]);
    }

    let instances = strategy
        .matrix
        .combinations()
        .into_iter()
        .filter(|combo| !strategy.is_excluded(combo))
        .map(|combo| {
            let cell = combo
                .iter()
                .map(|(_, v)| v.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            JobInstance {
                job_name: job_name.to_string(),
                name: format!("{job_name} ({cell})"),
                combination: combo,
                job: job.clone(),
            }
        })
        .collect();

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    // proptest's prelude carries a `Strategy` trait; name ours explicitly
    use super::Strategy;
    use crate::workflow::steps::Step;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn job_with_matrix(matrix: Matrix) -> Job {
        Job::builder()
            .step(Step::run("echo hi"))
            .strategy(Strategy {
                matrix,
                exclude: Vec::new(),
                fail_fast: true,
            })
            .build_unchecked()
    }

    #[test]
    fn test_expand_without_matrix() {
        let job = Job::builder().step(Step::run("echo hi")).build_unchecked();
        let instances = expand("lint", &job).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "lint");
        assert!(instances[0].combination.is_empty());
        assert_eq!(instances[0].job.steps, job.steps);
    }

    #[test]
    fn test_expand_single_axis() {
        let matrix = Matrix::new().axis(
            "python",
            vec!["3.7".to_string(), "3.8".to_string(), "3.9".to_string()],
        );
        let instances = expand("test", &job_with_matrix(matrix)).unwrap();
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].name, "test (3.7)");
        assert_eq!(instances[2].name, "test (3.9)");
    }

    #[test]
    fn test_expand_cartesian_product_order() {
        let matrix = Matrix::new()
            .axis("os", vec!["linux".to_string(), "macos".to_string()])
            .axis("python", vec!["3.8".to_string(), "3.9".to_string()]);
        let instances = expand("test", &job_with_matrix(matrix)).unwrap();
        let names: Vec<_> = instances.iter().map(|i| i.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "test (linux, 3.8)",
                "test (linux, 3.9)",
                "test (macos, 3.8)",
                "test (macos, 3.9)",
            ]
        );
    }

    #[test]
    fn test_expand_empty_axis_is_error() {
        let matrix = Matrix::new().axis("python", vec![]);
        let err = expand("test", &job_with_matrix(matrix)).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidMatrix { .. }));
    }

    #[test]
    fn test_exclusions() {
        let matrix = Matrix::new()
            .axis("os", vec!["linux".to_string(), "macos".to_string()])
            .axis("python", vec!["3.8".to_string(), "3.9".to_string()]);
        let strategy = Strategy {
            matrix,
            exclude: vec![HashMap::from([
                ("os".to_string(), "macos".to_string()),
                ("python".to_string(), "3.8".to_string()),
            ])],
            fail_fast: true,
        };
        let job = Job::builder()
            .step(Step::run("echo hi"))
            .strategy(strategy)
            .build_unchecked();
        let instances = expand("test", &job).unwrap();
        assert_eq!(instances.len(), 3);
        assert!(!instances.iter().any(|i| i.name == "test (macos, 3.8)"));
    }

    #[test]
    fn test_matrix_env_variables() {
        let matrix = Matrix::new().axis("python", vec!["3.9".to_string()]);
        let instances = expand("test", &job_with_matrix(matrix)).unwrap();
        let env = instances[0].matrix_env();
        assert_eq!(env.get("MATRIX_PYTHON").map(String::as_str), Some("3.9"));
    }

    #[test]
    fn test_deserialize_preserves_axis_order() {
        let yaml = "zeta: [a, b]\nalpha: [c]\n";
        let matrix: Matrix = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(matrix.axes[0].name, "zeta");
        assert_eq!(matrix.axes[1].name, "alpha");
    }

    #[test]
    fn test_deserialize_scalar_coercion() {
        let yaml = "python: [3.8, \"3.9\", 3]\nflag: [true]\n";
        let matrix: Matrix = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(matrix.axes[0].values, vec!["3.8", "3.9", "3"]);
        assert_eq!(matrix.axes[1].values, vec!["true"]);
    }

    proptest! {
        // Product of axis sizes == number of instances, all combinations unique
        #[test]
        fn prop_expansion_size(sizes in proptest::collection::vec(1usize..5, 1..4)) {
            let mut matrix = Matrix::new();
            for (i, size) in sizes.iter().enumerate() {
                let values = (0..*size).map(|v| format!("v{v}")).collect();
                matrix = matrix.axis(format!("axis{i}"), values);
            }
            let expected: usize = sizes.iter().product();
            prop_assert_eq!(matrix.combination_count(), expected);
            let instances = expand("job", &job_with_matrix(matrix)).unwrap();
            prop_assert_eq!(instances.len(), expected);

            let mut combos: Vec<_> = instances.iter().map(|i| i.combination.clone()).collect();
            combos.sort();
            combos.dedup();
            prop_assert_eq!(combos.len(), expected);
        }
    }
}
