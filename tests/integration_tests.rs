use retail_lq_signal::analyzers::SignalCalculator;
use retail_lq_signal::analyzers::outliers::{CorrectionPolicy, Distribution, OutlierDetector};
use retail_lq_signal::config::PipelineConfig;
use retail_lq_signal::ingest::{YearOutcome, YearProcessor};
use retail_lq_signal::source::{LocalDirSource, MemorySource};
use retail_lq_signal::storage::{FsStore, MemoryStore, SignalStore, StateYearStore};
use retail_lq_signal::types::Trend;
use std::sync::Arc;
use std::time::Duration;

const HEADER: &str = "\"area_fips\",\"own_code\",\"industry_code\",\"agglvl_code\",\"year\",\"lq_annual_avg_emplvl\"\n";

fn row(area: &str, code: &str, year: i32, lq: f64) -> String {
    format!("\"{area}\",\"5\",\"{code}\",\"54\",\"{year}\",\"{lq}\"\n")
}

fn year_file(year: i32, ca_lqs: &[f64], tx_lq: f64, ca_online: f64) -> String {
    let mut body = String::from(HEADER);
    for lq in ca_lqs {
        body.push_str(&row("06000", "445", year, *lq));
    }
    body.push_str(&row("06000", "454110", year, ca_online));
    body.push_str(&row("06037", "445", year, 7.0));
    body.push_str(&row("48000", "445", year, tx_lq));
    body.push_str(&row("48000", "454110", year, 1.0));
    body.push_str(&row("US000", "445", year, 1.0));
    body
}

fn config() -> PipelineConfig {
    PipelineConfig {
        ingest_batch_size: 3,
        signal_batch_size: 1,
        signal_batch_pause: Duration::from_millis(1),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_pipeline_in_memory() {
    let source = MemorySource::new()
        .with_year(2020, year_file(2020, &[1.0, 1.5, 2.0], 1.0, 0.5))
        .with_year(2021, year_file(2021, &[1.0, 1.0, 1.5], 1.2, 0.9));
    let store = Arc::new(MemoryStore::new());
    let config = config();

    let processor = YearProcessor::new(Arc::new(source), store.clone(), store.clone(), config.ingest_batch_size);
    let outcomes = processor.process_all_years().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, o)| matches!(o, YearOutcome::Processed { records: 2, .. })));

    let ca = store.get_all_state_year_records("CA").await.unwrap();
    assert_eq!(ca.len(), 2);
    assert_eq!(ca[0].brick_and_mortar_codes["445"], 4.5);
    assert_eq!(ca[1].brick_and_mortar_codes["445"], 3.5);

    // Second run is a no-op thanks to the ledger.
    let again = processor.process_all_years().await.unwrap();
    assert!(again.iter().all(|(_, o)| *o == YearOutcome::AlreadyProcessed));

    let calculator = SignalCalculator::new(store.clone(), store.clone(), &config);
    let summary = calculator.calculate_all().await.unwrap();
    assert_eq!(summary.signals_saved, 2);

    let signals = store.get_all_signals().await.unwrap();
    assert_eq!(signals.len(), 2);

    let ca = signals.iter().find(|s| s.state == "CA").unwrap();
    let tx = signals.iter().find(|s| s.state == "TX").unwrap();

    assert!((ca.physical_slope + 1.0).abs() < 1e-12);
    assert_eq!(ca.physical_trend, Trend::Declining);
    assert!((ca.ecommerce_slope - 0.4).abs() < 1e-12);
    assert_eq!(ca.ecommerce_trend, Trend::Growing);
    assert!((tx.physical_slope - 0.2).abs() < 1e-12);
    assert_eq!(tx.ecommerce_trend, Trend::Stable);
    assert_eq!(ca.years_analyzed, 2);
    assert_eq!(ca.data_points, 4);

    for s in &signals {
        assert!((0.0..=100.0).contains(&s.physical_score));
        assert!((0.0..=100.0).contains(&s.ecommerce_score));
    }
    // Declining store employment scores higher on displacement.
    assert!(ca.physical_score > tx.physical_score);
    assert!(ca.ecommerce_score > tx.ecommerce_score);
}

#[tokio::test]
async fn test_full_pipeline_on_disk() {
    let sources = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    std::fs::write(
        sources.path().join("2020.annual.singlefile.csv"),
        year_file(2020, &[2.0], 1.0, 0.5),
    )
    .unwrap();
    std::fs::write(
        sources.path().join("2021.annual.singlefile.csv"),
        year_file(2021, &[1.8], 1.1, 0.6),
    )
    .unwrap();
    std::fs::write(
        sources.path().join("2022.annual.singlefile.csv"),
        year_file(2022, &[1.5], 1.3, 0.9),
    )
    .unwrap();

    let store = Arc::new(FsStore::new(data.path()));
    let config = config();

    let processor = YearProcessor::new(
        Arc::new(LocalDirSource::new(sources.path())),
        store.clone(),
        store.clone(),
        config.ingest_batch_size,
    );
    processor.process_all_years().await.unwrap();

    assert_eq!(store.list_states_with_any_data().await.unwrap(), vec!["CA", "TX"]);
    assert!(data.path().join("processed/2021.json").exists());

    let calculator = SignalCalculator::new(store.clone(), store.clone(), &config);
    calculator.calculate_all().await.unwrap();

    let signals = store.get_all_signals().await.unwrap();
    assert_eq!(signals.len(), 2);
    assert!(signals.iter().all(|s| s.years_analyzed == 3));

    let ecommerce = calculator.ecommerce_scores().await.unwrap();
    assert_eq!(ecommerce.len(), 2);
    let physical = calculator.physical_scores().await.unwrap();
    assert_eq!(physical.corrected_scores.len(), 2);
}

struct Pin50;

impl CorrectionPolicy for Pin50 {
    fn correct(&self, _score: f64, _distribution: &Distribution, _std_multiple: f64) -> f64 {
        50.0
    }
}

#[tokio::test]
async fn test_physical_scores_use_configured_detector() {
    let mut source = MemorySource::new();
    // Twelve states with a gentle decline and one with a steep one.
    let states = [
        "01000", "02000", "04000", "05000", "06000", "08000", "09000", "10000", "12000", "13000", "15000",
        "16000",
    ];
    for (offset, year) in [2020, 2021].into_iter().enumerate() {
        let mut body = String::from(HEADER);
        for area in states {
            body.push_str(&row(area, "445", year, 2.0 - 0.1 * offset as f64));
        }
        body.push_str(&row("48000", "445", year, 3.0 - 2.5 * offset as f64));
        source = source.with_year(year, body);
    }

    let store = Arc::new(MemoryStore::new());
    let config = config();
    YearProcessor::new(Arc::new(source), store.clone(), store.clone(), 100)
        .process_all_years()
        .await
        .unwrap();

    let calculator = SignalCalculator::new(store.clone(), store.clone(), &config)
        .with_detector(OutlierDetector::new(2.0, Box::new(Pin50)));
    calculator.calculate_all().await.unwrap();

    let report = calculator.physical_scores().await.unwrap();
    assert_eq!(report.outliers, vec!["TX"]);
    assert_eq!(report.corrected_scores["TX"], 50.0);

    let stored_tx = store
        .get_all_signals()
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.state == "TX")
        .unwrap();
    assert!(stored_tx.physical_score > 50.0);
}
