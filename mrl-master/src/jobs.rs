use anyhow::{bail, Result};
use common::Operation;

/// Index of a job within its phase, in `[0, num_jobs)`.
pub type JobIndex = usize;

/// Parameters of a MapReduce run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The input file, as the workers see it.
    pub file: String,

    /// Number of map jobs.
    pub n_map: usize,

    /// Number of reduce jobs.
    pub n_reduce: usize,
}

impl SchedulerConfig {
    /// Fails when `n_reduce` is zero while there are map jobs: every map job
    /// would be rejected for lack of a partition to write to, and each
    /// rejection takes a healthy worker offline.
    pub fn new(file: impl Into<String>, n_map: usize, n_reduce: usize) -> Result<Self> {
        if n_map > 0 && n_reduce == 0 {
            bail!("{} map jobs need at least one reduce job", n_map);
        }
        Ok(Self {
            file: file.into(),
            n_map,
            n_reduce,
        })
    }

    /// The map phase, parameterized by the reduce job count.
    pub fn map_phase(&self) -> Phase {
        Phase {
            file: self.file.clone(),
            operation: Operation::Map,
            num_jobs: self.n_map,
            num_other_phase: self.n_reduce,
        }
    }

    /// The reduce phase, parameterized by the map job count.
    pub fn reduce_phase(&self) -> Phase {
        Phase {
            file: self.file.clone(),
            operation: Operation::Reduce,
            num_jobs: self.n_reduce,
            num_other_phase: self.n_map,
        }
    }
}

/// One of the two sequential stages of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub file: String,
    pub operation: Operation,
    pub num_jobs: usize,
    pub num_other_phase: usize,
}

impl Phase {
    /// Build the arguments of the `DoJob` call for `job_number`.
    pub fn job(&self, job_number: JobIndex) -> DoJobArgs {
        DoJobArgs {
            file: self.file.clone(),
            operation: self.operation,
            job_number,
            num_other_phase: self.num_other_phase,
        }
    }
}

/// Arguments of one `DoJob` call. Immutable once built; each dispatch owns
/// its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoJobArgs {
    pub file: String,
    pub operation: Operation,
    pub job_number: JobIndex,
    pub num_other_phase: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_carry_the_other_phase_count() {
        let config = SchedulerConfig::new("kjv12.txt", 5, 3).unwrap();

        let map = config.map_phase();
        assert_eq!(map.operation, Operation::Map);
        assert_eq!(map.num_jobs, 5);
        assert_eq!(map.num_other_phase, 3);

        let reduce = config.reduce_phase();
        assert_eq!(reduce.operation, Operation::Reduce);
        assert_eq!(reduce.num_jobs, 3);
        assert_eq!(reduce.num_other_phase, 5);

        assert_eq!(
            reduce.job(2),
            DoJobArgs {
                file: "kjv12.txt".to_string(),
                operation: Operation::Reduce,
                job_number: 2,
                num_other_phase: 5,
            }
        );
    }

    #[test]
    fn map_jobs_without_reduce_jobs_are_rejected() {
        assert!(SchedulerConfig::new("kjv12.txt", 5, 0).is_err());
        assert!(SchedulerConfig::new("kjv12.txt", 0, 0).is_ok());
        assert!(SchedulerConfig::new("kjv12.txt", 0, 1).is_ok());
    }
}
