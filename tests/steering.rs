use doaloc::steering::{preprocess, PairSteeringTable};
use doaloc::{Direction, DirectionGrid, Error, MicArray, Position, REFERENCE_MICS, F};
use float_cmp::assert_approx_eq;

const C: F = 343.;

fn end_fire_pair() -> MicArray {
    MicArray::new([[0.05, 0., 0.], [-0.05, 0., 0.]]).unwrap()
}

#[test]
fn delays_follow_baseline_angle() {
    let array = end_fire_pair();
    let pair = &array.pairs()[0];
    assert_approx_eq!(F, pair.distance, 0.1);

    let directions = [Position::x(), -Position::x(), Position::y()];
    let table = PairSteeringTable::new(pair, &directions, C, 5.);
    assert_approx_eq!(F, table.alpha()[0], 0., epsilon = 1e-9);
    assert_approx_eq!(F, table.alpha()[1], 180., epsilon = 1e-9);
    assert_approx_eq!(F, table.alpha()[2], 90., epsilon = 1e-9);

    assert_eq!(table.alpha_sampled().len(), 37);
    assert_eq!(table.tau_grid().len(), 37);
    assert_approx_eq!(F, table.tau_grid()[0], 0.1 / C, epsilon = 1e-12);
    assert_approx_eq!(F, table.tau_grid()[18], 0., epsilon = 1e-12);
    assert_approx_eq!(F, table.tau_grid()[36], -0.1 / C, epsilon = 1e-12);
}

#[test]
fn coarse_sampling_covers_reached_angles() {
    let array = MicArray::new([[0., 0.05, 0.], [0., -0.05, 0.]]).unwrap();
    let grid = DirectionGrid::new((-30., 30.), (0., 0.), 1.).unwrap();
    let tables = preprocess(&array, &grid, C, 7.).unwrap();
    let table = &tables[0];

    // azimuth +-30 on the equator is 60..=120 degrees from the y axis
    assert_eq!(table.alpha().len(), grid.len());
    assert_approx_eq!(F, table.alpha()[0], 120., epsilon = 1e-9);
    assert_approx_eq!(F, table.alpha()[30], 90., epsilon = 1e-9);
    let sampled = table.alpha_sampled();
    assert_eq!(sampled.len(), 11);
    assert_approx_eq!(F, sampled[0], 56., epsilon = 1e-9);
    assert_approx_eq!(F, *sampled.last().unwrap(), 126., epsilon = 1e-9);
    assert!(sampled.windows(2).all(|w| w[0] < w[1]));
    for &alpha in table.alpha() {
        assert!(sampled[0] <= alpha + 1e-9 && alpha <= sampled.last().unwrap() + 1e-9);
    }
}

#[test]
fn reference_array_tables() {
    let array = MicArray::new(REFERENCE_MICS).unwrap();
    assert_eq!(array.pairs().len(), 28);
    let grid = DirectionGrid::new((-179., 180.), (-90., 90.), 5.).unwrap();
    let tables = preprocess(&array, &grid, C, 5.).unwrap();
    assert_eq!(tables.len(), 28);
    for (pair, table) in array.pairs().iter().zip(&tables) {
        assert!(table
            .alpha()
            .iter()
            .all(|&a| a.is_finite() && (0. ..=180. + 1e-9).contains(&a)));
        let max_delay = pair.distance / C;
        assert!(table
            .tau_grid()
            .iter()
            .all(|t| t.abs() <= max_delay + 1e-15));
    }

    // the direction along a baseline sees the full pair delay
    let pair = &array.pairs()[0];
    let along = Direction::new(
        pair.baseline.y.atan2(pair.baseline.x).to_degrees(),
        (pair.baseline.z / pair.distance).asin().to_degrees(),
    );
    let table = PairSteeringTable::new(pair, &[along.to_unit_vec()], C, 1.);
    assert_approx_eq!(F, table.alpha()[0], 0., epsilon = 1e-5);
    assert_approx_eq!(F, table.tau_grid()[0], pair.distance / C, epsilon = 1e-12);
}

#[test]
fn rejects_invalid_parameters() {
    let array = end_fire_pair();
    let grid = DirectionGrid::default();
    assert!(matches!(
        preprocess(&array, &grid, -1., 5.),
        Err(Error::InvalidSpeedOfSound(_))
    ));
    assert!(matches!(
        preprocess(&array, &grid, F::NAN, 5.),
        Err(Error::InvalidSpeedOfSound(_))
    ));
    assert!(matches!(
        preprocess(&array, &grid, C, 0.),
        Err(Error::InvalidConfig(_))
    ));
}
