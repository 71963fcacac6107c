//! Integration tests for the complete estimation workflow
//!
//! Prices go in, labelled betas come out: return extraction, the per-series
//! stages, calendar alignment, the multi-asset analyzer and labelling.

use assert_approx_eq::assert_approx_eq;
use continuous_beta::generators::{generate_intraday_pair, IntradayPair, IntradayPairConfig};
use continuous_beta::{
    find_alignment_offset, label_betas, AlignmentOffset, ContinuousBetaAnalyzer,
    ContinuousBetaEstimator, EstimatorConfig,
};

const SLOTS: usize = 8;

fn diffusive_pair(days: usize, seed: u64) -> IntradayPair {
    generate_intraday_pair(&IntradayPairConfig {
        days,
        slots_per_day: SLOTS,
        seed,
        beta: 1.2,
        idiosyncratic_daily_vol: 0.003,
        jump_probability: 0.0,
        ..IntradayPairConfig::default()
    })
    .unwrap()
}

fn bar_dates(days: usize, first_day: usize) -> Vec<String> {
    (0..days * SLOTS)
        .map(|i| format!("2024-D{:03}", first_day + i / SLOTS))
        .collect()
}

/// Scenario: a single asset estimated from raw prices
///
/// With thresholds far above any return the estimator reduces to the
/// regression beta, which should recover the generating beta.
#[test]
fn test_end_to_end_beta_recovery() {
    let pair = diffusive_pair(80, 2024);
    let estimator = ContinuousBetaEstimator::new(EstimatorConfig::new(20, SLOTS).with_limit_k(1e3))
        .unwrap();

    let index = estimator.prepare_prices(&pair.index.open, &pair.index.close).unwrap();
    let asset = estimator.prepare_prices(&pair.asset.open, &pair.asset.close).unwrap();
    assert_eq!(index.returns().len(), 80 * SLOTS);
    assert_eq!(index.num_windows(), 60);

    let betas = estimator.estimate(&asset, &index, AlignmentOffset(0)).unwrap();
    assert_eq!(betas.len(), 60);
    assert_eq!(betas.failures().count(), 0);

    let values = betas.to_vec_lossy();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert!((mean - 1.2).abs() < 0.1, "mean beta {} far from 1.2", mean);
    for beta in values {
        assert!((beta - 1.2).abs() < 0.2, "window beta {} far from 1.2", beta);
    }
}

/// Scenario: an asset listed later than the index
///
/// The offset is found from the dates, the asset windows are paired with the
/// shifted index windows and each beta is labelled with the day after its window.
#[test]
fn test_aligned_asset_through_analyzer() {
    let days = 50;
    let listing_day = 10;
    let window_days = 20;
    let pair = diffusive_pair(days, 77);
    let start = listing_day * SLOTS;

    let index_dates = bar_dates(days, 0);
    let asset_dates = bar_dates(days - listing_day, listing_day);
    let offset = find_alignment_offset(&index_dates, &asset_dates[0]).unwrap();
    assert_eq!(offset, AlignmentOffset(start));

    let mut analyzer =
        ContinuousBetaAnalyzer::new(EstimatorConfig::new(window_days, SLOTS).with_limit_k(1e3))
            .unwrap();
    analyzer
        .set_index_prices(&pair.index.open, &pair.index.close)
        .unwrap();
    assert!(analyzer
        .add_asset(
            "LATE".to_string(),
            &pair.asset.open[start..],
            &pair.asset.close[start..],
            offset,
        )
        .unwrap());
    assert!(analyzer
        .add_asset(
            "INDEX".to_string(),
            &pair.index.open,
            &pair.index.close,
            AlignmentOffset(0),
        )
        .unwrap());

    let results = analyzer.analyze_all_assets().unwrap();
    assert_eq!(results.len(), 2);

    let late = results["LATE"].as_ref().unwrap();
    assert_eq!(late.len(), days - listing_day - window_days);
    assert_eq!(late.offset_days(), listing_day);
    for (_, beta) in late.successful() {
        assert!((beta - 1.2).abs() < 0.2, "window beta {} far from 1.2", beta);
    }

    let own = results["INDEX"].as_ref().unwrap();
    assert_eq!(own.len(), days - window_days);
    for (_, beta) in own.successful() {
        assert_approx_eq!(beta, 1.0, 1e-9);
    }

    let labelled = label_betas(late, &asset_dates, &pair.asset.close[start..]).unwrap();
    assert_eq!(labelled.len(), late.len());
    assert_eq!(labelled[0].day, format!("2024-D{:03}", listing_day + window_days));
    assert_eq!(
        labelled[0].close,
        pair.asset.close[start + (window_days + 1) * SLOTS - 1]
    );
    assert_eq!(labelled[0].beta, late.to_vec_lossy()[0]);
}

/// Scenario: one prepared index shared by several assets
#[test]
fn test_prepared_index_is_reused() {
    let pair = diffusive_pair(30, 5);
    let estimator =
        ContinuousBetaEstimator::new(EstimatorConfig::new(10, SLOTS).with_limit_k(1e3)).unwrap();
    let index = estimator.prepare_prices(&pair.index.open, &pair.index.close).unwrap();
    let asset = estimator.prepare_prices(&pair.asset.open, &pair.asset.close).unwrap();

    let first = estimator.estimate(&asset, &index, AlignmentOffset(0)).unwrap();
    let again = estimator.estimate(&asset, &index, AlignmentOffset(0)).unwrap();
    assert_eq!(first, again);

    let mut analyzer = ContinuousBetaAnalyzer::with_estimator(estimator);
    analyzer
        .set_index_prices(&pair.index.open, &pair.index.close)
        .unwrap();
    analyzer
        .add_asset("A".to_string(), &pair.asset.open, &pair.asset.close, AlignmentOffset(0))
        .unwrap();
    assert_eq!(analyzer.analyze_asset("A").unwrap(), first);
    assert_eq!(analyzer.get_analysis_results("A").unwrap(), first);
    assert_eq!(analyzer.index().unwrap().thresholds(), index.thresholds());
}

/// Scenario: the derived truncation constant on jumpy data
///
/// Every window either produces a finite beta or reports its own degenerate
/// truncation; nothing aborts the series.
#[test]
fn test_default_truncation_constant_on_jumpy_data() {
    let pair = generate_intraday_pair(&IntradayPairConfig {
        days: 30,
        slots_per_day: SLOTS,
        jump_probability: 0.02,
        ..IntradayPairConfig::default()
    })
    .unwrap();
    let config = EstimatorConfig::new(10, SLOTS);
    assert_approx_eq!(config.limit_k(), 2.5 * (SLOTS as f64).powf(-0.49), 1e-12);

    let estimator = ContinuousBetaEstimator::new(config).unwrap();
    let index = estimator.prepare_prices(&pair.index.open, &pair.index.close).unwrap();
    let asset = estimator.prepare_prices(&pair.asset.open, &pair.asset.close).unwrap();
    let betas = estimator.estimate(&asset, &index, AlignmentOffset(0)).unwrap();

    assert_eq!(betas.len(), 20);
    for value in betas.values() {
        match value {
            Ok(beta) => assert!(beta.is_finite()),
            Err(e) => assert!(e.is_window_local(), "unexpected error {:?}", e),
        }
    }
    assert_eq!(betas.label_day(0), 10);
    assert_eq!(betas.label_day(19), 29);
}
