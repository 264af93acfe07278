use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_pipeline::descriptor::{
    DatasetSpec, ModelSpec, ParamValue, PipelineDescriptor, PreprocessStep, ScaleMethod, ScaleTarget,
    SearchArguments, SearchMethod, SearchSpec, SplitSpec, TargetSpec, TaskType,
};
use kolosal_pipeline::pipeline::PipelineDispatcher;
use polars::prelude::*;
use rand::prelude::*;

fn create_regression_data(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(0);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Create target as sum of features + noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Series::new(format!("feature_{}", i).into(), values).into())
        .collect();
    columns.push(Series::new("target".into(), target).into());

    DataFrame::new(columns).unwrap()
}

fn descriptor(model: ModelSpec) -> PipelineDescriptor {
    PipelineDescriptor::new(
        DatasetSpec::default()
            .with_split(SplitSpec::new(0.2, true))
            .with_step(PreprocessStep::scale(ScaleMethod::Standard, ScaleTarget::Inputs)),
        model,
        TargetSpec::new(["target"]),
    )
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    let linear = descriptor(ModelSpec::new(TaskType::Regression, "LinearRegression"));
    for n_rows in [1000, 5000, 10000].iter() {
        let df = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("linear", n_rows), &df, |b, df| {
            b.iter(|| {
                PipelineDispatcher::new()
                    .with_seed(0)
                    .run_frame(&linear, black_box(df.clone()))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    let forest = descriptor(
        ModelSpec::new(TaskType::Regression, "RandomForest").with_search(
            SearchSpec::new(SearchMethod::GridSearch)
                .with_param("n_estimators", vec![ParamValue::Int(10), ParamValue::Int(20)])
                .with_param("max_depth", vec![ParamValue::Int(4), ParamValue::Int(8)])
                .with_arguments(SearchArguments {
                    cv: 3,
                    ..SearchArguments::default()
                }),
        ),
    );
    let df = create_regression_data(2000, 8);

    group.bench_function("random_forest_grid", |b| {
        b.iter(|| {
            PipelineDispatcher::new()
                .with_seed(0)
                .run_frame(&forest, black_box(df.clone()))
                .unwrap()
        })
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Fit once
    let train_df = create_regression_data(5000, 10);
    let run = PipelineDispatcher::new()
        .with_seed(0)
        .run_frame(&descriptor(ModelSpec::new(TaskType::Regression, "KNN")), train_df)
        .unwrap();

    for n_rows in [100, 1000].iter() {
        let test_df = create_regression_data(*n_rows, 10).drop("target").unwrap();

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &test_df, |b, df| {
            b.iter(|| run.pipeline.predict(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_search, bench_prediction);
criterion_main!(benches);
