//! Integration scenario tests matching spec §8's concrete scenarios not
//! already covered by the inline `#[cfg(test)]` suites in `src/`:
//! S4 (beam throttling) and S6 (lattice reachability). S1/S2/S3/S5 are
//! exercised inline in `src/decoder.rs` against the same synthetic
//! acoustic model shape.

mod common;

use common::ScriptedAcousticModel;
use fsg_decoder::hmm::HmmTopology;
use fsg_decoder::{DecoderConfig, FsgDecoder, FsgModel, LogMath, SimpleDictionary};

fn topo() -> HmmTopology {
    HmmTopology::uniform(-1, -2)
}

/// S4: forcing more active HMMs than `maxhmmpf` narrows `beam_factor`
/// geometrically by 0.9 per over-cap frame, never below 0.1 (spec §8#7).
#[test]
fn s4_beam_throttles_under_a_wide_active_set() {
    let logmath = LogMath::default_base();
    let n_words = 40;
    let n_frames = 25;

    let mut fsg = FsgModel::new(1, 0, 0, 1.0);
    let mut dict = SimpleDictionary::new(n_words as usize + 1);
    for i in 0..n_words {
        let word = format!("W{i}");
        fsg.add_arc(0, 0, &word, 1.0, &logmath);
        dict.add_word(&word, vec![i as u16]);
    }

    let config = DecoderConfig {
        maxhmmpf: 5,
        fsgusefiller: false,
        ..DecoderConfig::default()
    };
    let acoustic = ScriptedAcousticModel::new([-1, -1, -1], n_frames);
    let mut dec = FsgDecoder::new(config, logmath, dict, acoustic, topo());
    dec.fsg_set_add("g", fsg);
    dec.fsg_set_select("g").unwrap();
    dec.start().unwrap();

    assert_eq!(dec.beam_factor(), 1.0);
    let mut factors = Vec::new();
    while dec.step().unwrap() {
        factors.push(dec.beam_factor());
    }

    // Every active-HMM-over-cap frame narrows by exactly 0.9, floored at 0.1.
    assert!(factors.iter().any(|&f| f < 1.0), "beam never narrowed");
    for f in &factors {
        assert!(*f >= 0.1 - 1e-9, "beam_factor {f} dropped below the floor");
    }
    let min = factors.iter().cloned().fold(f64::INFINITY, f64::min);
    assert!(
        (min - 0.1).abs() < 1e-6,
        "expected the floor to be reached after {} over-cap frames, got min {min}",
        factors.len()
    );
}

/// S6: a spurious branch that never reaches the final state is pruned
/// from the lattice by reachability (spec §8#5/#6).
#[test]
fn s6_lattice_prunes_unreachable_spurious_branch() {
    let logmath = LogMath::default_base();

    // 0 -A-> 1(final); 0 -B-> 2 (dead end, no path to the final state).
    let mut fsg = FsgModel::new(3, 0, 1, 1.0);
    fsg.add_arc(0, 1, "A", 1.0, &logmath);
    fsg.add_arc(0, 2, "B", 1.0, &logmath);
    let wid_b = fsg.word_id("B").unwrap();

    let mut dict = SimpleDictionary::new(10);
    dict.add_word("A", vec![1, 2]);
    dict.add_word("B", vec![3, 4]);

    let config = DecoderConfig {
        fsgusefiller: false,
        ..DecoderConfig::default()
    };
    let acoustic = ScriptedAcousticModel::new([-1, -1, -1], 10);
    let mut dec = FsgDecoder::new(config, logmath, dict, acoustic, topo());
    dec.fsg_set_add("g", fsg);
    dec.fsg_set_select("g").unwrap();
    dec.start().unwrap();
    while dec.step().unwrap() {}
    dec.finish().unwrap();

    assert_eq!(dec.hyp().as_deref(), Some("A"));

    let lattice = dec.lattice().expect("a lattice must be buildable");
    assert!(
        lattice.nodes().iter().all(|n| n.word_id != wid_b),
        "spurious branch B must be pruned as unreachable from the lattice end"
    );
}
