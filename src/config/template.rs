//! Starter configuration documents (`init` command)

use super::to_yaml;
use crate::descriptor::{
    DatasetSpec, ImputeStrategy, ModelSpec, PipelineDescriptor, PreprocessStep, ScaleMethod,
    ScaleTarget, SplitSpec, TargetSpec, TaskType,
};
use crate::error::Result;

/// Default descriptor for a task, algorithm and target column
pub fn init_descriptor(task_type: TaskType, algorithm: &str, target: &str) -> PipelineDescriptor {
    let dataset = DatasetSpec::default()
        .with_split(SplitSpec::new(0.2, true))
        .with_step(PreprocessStep::MissingValues(ImputeStrategy::Mean))
        .with_step(PreprocessStep::scale(ScaleMethod::Standard, ScaleTarget::Inputs));

    PipelineDescriptor::new(
        dataset,
        ModelSpec::new(task_type, algorithm),
        TargetSpec::new([target]),
    )
}

/// Starter document text; loads back to [`init_descriptor`]
pub fn init_document(task_type: TaskType, algorithm: &str, target: &str) -> Result<String> {
    let descriptor = init_descriptor(task_type, algorithm, target);
    let body = to_yaml(&descriptor)?;
    Ok(format!(
        "# Pipeline configuration generated by kolosal-pipeline init\n\
         # Run `kolosal-pipeline models -t {}` for supported algorithms.\n\
         {}",
        task_type, body
    ))
}
