//! Tests for record predicates

use fragsrc_protocol::{types, RecordBuilder};

use crate::predicate::{AcceptAll, Decision, RecordPredicate, TypeFilter};

#[test]
fn test_accept_all() {
    let predicate = AcceptAll;
    for tag in [types::BEGIN_RUN, types::PHYSICS_EVENT, types::PERIODIC_SCALERS, 999] {
        let record = RecordBuilder::new(tag).build_record();
        assert_eq!(predicate.evaluate(&record), Decision::Accept);
    }
}

#[test]
fn test_type_filter_accepts_listed_types() {
    let predicate = TypeFilter::new([types::PHYSICS_EVENT, types::END_RUN]);

    let physics = RecordBuilder::new(types::PHYSICS_EVENT).build_record();
    let end = RecordBuilder::new(types::END_RUN).build_record();
    let scalers = RecordBuilder::new(types::PERIODIC_SCALERS).build_record();

    assert_eq!(predicate.evaluate(&physics), Decision::Accept);
    assert_eq!(predicate.evaluate(&end), Decision::Accept);
    assert_eq!(predicate.evaluate(&scalers), Decision::Reject);
}

#[test]
fn test_type_filter_sampling() {
    let predicate =
        TypeFilter::new([types::PHYSICS_EVENT]).sampled([types::PERIODIC_SCALERS]);

    let scalers = RecordBuilder::new(types::PERIODIC_SCALERS).build_record();
    assert_eq!(predicate.evaluate(&scalers), Decision::Sample);

    // Sampling list wins over the accept list if a tag is on both.
    let both = TypeFilter::new([types::PERIODIC_SCALERS]).sampled([types::PERIODIC_SCALERS]);
    assert_eq!(both.evaluate(&scalers), Decision::Sample);
}
