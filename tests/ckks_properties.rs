use std::thread;

use ckks_rns::ckks::{CkksEngine, CkksError, SchemeParameters, SecurityLevel};
use num_complex::Complex64;

const EPS: f64 = 1e-3;

fn engine(mult_depth: usize, scale_factor_bits: u32, batch_size: usize) -> CkksEngine {
    let mut engine = CkksEngine::new();
    engine
        .key_gen(mult_depth, scale_factor_bits, batch_size)
        .unwrap();
    engine
}

fn assert_close(actual: &[f64], expected: &[f64], eps: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!((a - e).abs() < eps, "slot {}: {} vs {}", i, a, e);
    }
}

fn max_error(actual: &[f64], expected: &[f64]) -> f64 {
    actual
        .iter()
        .zip(expected.iter())
        .map(|(a, e)| (a - e).abs())
        .fold(0.0, f64::max)
}

#[test]
fn encrypt_then_decrypt_round_trips() {
    let engine = engine(2, 40, 8);
    let v = [0.5, -1.25, 3.0, 0.0, 7.5, -0.001, 2.25, 100.0];
    let ct = engine.encrypt(&v).unwrap();
    assert_eq!(ct.level(), 2);
    assert_eq!(ct.num_slots(), 8);
    assert_close(&engine.decrypt(&ct).unwrap(), &v, EPS);
}

#[test]
fn short_inputs_are_zero_padded() {
    let engine = engine(1, 40, 8);
    let ct = engine.encrypt(&[1.0, 2.0, 3.0]).unwrap();
    assert_close(
        &engine.decrypt(&ct).unwrap(),
        &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        EPS,
    );
}

#[test]
fn error_shrinks_with_larger_scale() {
    let v: Vec<f64> = (0..8).map(|i| i as f64 / 8.0 - 0.5).collect();

    let coarse = engine(1, 25, 8);
    let coarse_err = max_error(&coarse.decrypt(&coarse.encrypt(&v).unwrap()).unwrap(), &v);

    let fine = engine(1, 45, 8);
    let fine_err = max_error(&fine.decrypt(&fine.encrypt(&v).unwrap()).unwrap(), &v);

    assert!(fine_err < coarse_err, "{} vs {}", fine_err, coarse_err);
}

#[test]
fn complex_slots_round_trip() {
    let engine = engine(1, 40, 4);
    let v = vec![
        Complex64::new(0.47, 0.97),
        Complex64::new(0.12, 0.77),
        Complex64::new(-0.45, 0.37),
        Complex64::new(0.08, -0.39),
    ];
    let ct = engine.encrypt_complex(&v).unwrap();
    let decrypted = engine.decrypt_complex(&ct).unwrap();
    for (a, e) in decrypted.iter().zip(v.iter()) {
        assert!((a - e).norm() < EPS);
    }
}

#[test]
fn eval_add_is_elementwise_sum() {
    let engine = engine(2, 40, 4);
    let ct1 = engine.encrypt(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let ct2 = engine.encrypt(&[0.5, -2.0, 10.0, 0.25]).unwrap();
    let sum = engine.eval_add(&ct1, &ct2).unwrap();
    assert_eq!(sum.level(), ct1.level());
    assert_eq!(sum.scale(), ct1.scale());
    assert_close(&engine.decrypt(&sum).unwrap(), &[1.5, 0.0, 13.0, 4.25], EPS);

    let diff = engine.eval_sub(&ct1, &ct2).unwrap();
    assert_close(&engine.decrypt(&diff).unwrap(), &[0.5, 4.0, -7.0, 3.75], EPS);

    let neg = engine.eval_negate(&ct1).unwrap();
    assert_close(&engine.decrypt(&neg).unwrap(), &[-1.0, -2.0, -3.0, -4.0], EPS);

    let shifted = engine.eval_add_const(&ct1, -1.0).unwrap();
    assert_close(&engine.decrypt(&shifted).unwrap(), &[0.0, 1.0, 2.0, 3.0], EPS);
}

#[test]
fn eval_mult_is_elementwise_product() {
    let engine = engine(2, 40, 4);
    let ct1 = engine.encrypt(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let ct2 = engine.encrypt(&[0.5, -2.0, 1.5, 0.25]).unwrap();
    let product = engine.eval_mult(&ct1, &ct2).unwrap();
    assert_eq!(product.level(), ct1.level() - 1);
    assert_close(&engine.decrypt(&product).unwrap(), &[0.5, -4.0, 4.5, 1.0], EPS);
}

#[test]
fn depth_ceiling_is_enforced() {
    let depth = 2;
    let engine = engine(depth, 40, 4);
    let v = [0.9, -0.5, 1.1, 0.3];
    let mut ct = engine.encrypt(&v).unwrap();
    let mut expected = v.to_vec();
    for _ in 0..depth {
        ct = engine.eval_mult(&ct, &ct).unwrap();
        expected.iter_mut().for_each(|x| *x *= *x);
    }
    assert_eq!(ct.level(), 0);
    assert_close(&engine.decrypt(&ct).unwrap(), &expected, EPS);

    assert_eq!(
        engine.eval_mult(&ct, &ct).unwrap_err(),
        CkksError::DepthExhausted
    );
    assert_eq!(
        engine.eval_mult_const(&ct, &[2.0]).unwrap_err(),
        CkksError::DepthExhausted
    );
}

#[test]
fn misaligned_levels_are_rejected() {
    let engine = engine(2, 40, 4);
    let ct1 = engine.encrypt(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let ct2 = engine.encrypt(&[2.0, 2.0, 2.0, 2.0]).unwrap();
    let product = engine.eval_mult(&ct1, &ct2).unwrap();

    assert_eq!(
        engine.eval_add(&product, &ct1).unwrap_err(),
        CkksError::LevelMismatch { left: 1, right: 2 }
    );

    // explicit alignment
    let ct1_down = engine.mod_down_to(&ct1, 1).unwrap();
    let sum = engine.eval_add(&product, &ct1_down).unwrap();
    assert_close(&engine.decrypt(&sum).unwrap(), &[3.0, 6.0, 9.0, 12.0], EPS);
}

#[test]
fn product_plus_aligned_operand_at_small_scales() {
    let x = [0.5, 1.0, 1.5, 2.0];
    let y = [2.0, -1.0, 0.5, 3.0];
    let expected: Vec<f64> = x.iter().zip(y.iter()).map(|(a, b)| a * b + a).collect();
    for bits in [20, 25, 30] {
        let engine = engine(2, bits, 4);
        let ct_x = engine.encrypt(&x).unwrap();
        let ct_y = engine.encrypt(&y).unwrap();
        let product = engine.eval_mult(&ct_x, &ct_y).unwrap();
        let ct_x_down = engine.mod_down_to(&ct_x, 1).unwrap();
        let sum = engine.eval_add(&product, &ct_x_down).unwrap();
        assert_close(&engine.decrypt(&sum).unwrap(), &expected, 0.05);
    }
}

#[test]
fn mismatched_slot_counts_are_rejected() {
    let wide = engine(2, 40, 8);
    let narrow = engine(2, 40, 4);
    let ct_wide = wide.encrypt(&[1.0; 8]).unwrap();
    let ct_narrow = narrow.encrypt(&[1.0; 4]).unwrap();
    assert_eq!(
        wide.eval_add(&ct_wide, &ct_narrow).unwrap_err(),
        CkksError::SlotMismatch { left: 8, right: 4 }
    );
}

#[test]
fn eval_sum_totals_every_slot() {
    let engine = engine(1, 40, 4);
    let ct = engine.encrypt(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let total = engine.eval_sum(&ct, 4).unwrap();
    assert_eq!(total.level(), ct.level());
    assert_close(&engine.decrypt(&total).unwrap(), &[10.0; 4], EPS);

    assert!(matches!(
        engine.eval_sum(&ct, 6),
        Err(CkksError::InvalidInput(_))
    ));
}

#[test]
fn eval_sum_accepts_padded_slot_count() {
    let engine = engine(1, 40, 3);
    let ct = engine.encrypt(&[1.0, 2.0, 3.0]).unwrap();
    assert_eq!(ct.num_slots(), 4);
    let total = engine.eval_sum(&ct, 4).unwrap();
    assert_close(&engine.decrypt(&total).unwrap(), &[6.0; 3], EPS);

    assert!(matches!(
        engine.eval_sum(&ct, 8),
        Err(CkksError::InvalidInput(_))
    ));
}

#[test]
fn eval_rotate_moves_slots() {
    let engine = engine(1, 40, 8);
    let v: Vec<f64> = (1..=8).map(f64::from).collect();
    let ct = engine.encrypt(&v).unwrap();

    let left = engine.eval_rotate(&ct, 3).unwrap();
    assert_close(
        &engine.decrypt(&left).unwrap(),
        &[4.0, 5.0, 6.0, 7.0, 8.0, 1.0, 2.0, 3.0],
        EPS,
    );

    let right = engine.eval_rotate(&ct, -1).unwrap();
    assert_close(
        &engine.decrypt(&right).unwrap(),
        &[8.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        EPS,
    );
}

#[test]
fn mult_const_matches_encrypted_constant() {
    let engine = engine(2, 40, 4);
    let v = [1.5, -2.0, 0.25, 3.0];
    let constants = [2.0, 0.5, -4.0, 1.0];
    let ct = engine.encrypt(&v).unwrap();

    let by_const = engine.eval_mult_const(&ct, &constants).unwrap();
    let by_cipher = engine
        .eval_mult(&ct, &engine.encrypt(&constants).unwrap())
        .unwrap();
    assert_eq!(by_const.level(), by_cipher.level());

    let expected = [3.0, -1.0, -1.0, 3.0];
    assert_close(&engine.decrypt(&by_const).unwrap(), &expected, EPS);
    assert_close(
        &engine.decrypt(&by_const).unwrap(),
        &engine.decrypt(&by_cipher).unwrap(),
        EPS,
    );

    assert!(matches!(
        engine.eval_mult_const(&ct, &[1.0; 5]),
        Err(CkksError::InvalidInput(_))
    ));
}

#[test]
fn encryption_is_randomized() {
    let engine = engine(1, 40, 4);
    let v = [0.1, 0.2, 0.3, 0.4];
    let ct1 = engine.encrypt(&v).unwrap();
    let ct2 = engine.encrypt(&v).unwrap();
    assert_ne!(format!("{:?}", ct1), format!("{:?}", ct2));
    assert_close(&engine.decrypt(&ct1).unwrap(), &v, EPS);
    assert_close(&engine.decrypt(&ct2).unwrap(), &v, EPS);
}

#[test]
fn operations_need_key_gen_first() {
    let mut engine = CkksEngine::new();
    assert_eq!(
        engine.encrypt(&[1.0]).unwrap_err(),
        CkksError::UninitializedContext
    );

    engine.key_gen(1, 40, 4).unwrap();
    let old = engine.encrypt(&[1.0, 2.0]).unwrap();
    assert_close(&engine.decrypt(&old).unwrap(), &[1.0, 2.0, 0.0, 0.0], EPS);

    // a second key_gen replaces everything and keeps working
    engine.key_gen(2, 40, 8).unwrap();
    assert_eq!(engine.params().unwrap().mult_depth(), 2);
    let ct = engine.encrypt(&[3.0, 4.0]).unwrap();
    let product = engine.eval_mult(&ct, &ct).unwrap();
    assert_close(
        &engine.decrypt(&product).unwrap(),
        &[9.0, 16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        EPS,
    );
}

#[test]
fn too_many_values_are_rejected() {
    let engine = engine(1, 40, 4);
    assert!(matches!(
        engine.encrypt(&[1.0; 5]),
        Err(CkksError::InvalidInput(_))
    ));
}

#[test]
fn key_gen_picks_secure_ring_dimension() {
    let engine = engine(2, 40, 8);
    let params = engine.params().unwrap();
    assert_eq!(params.security_level(), SecurityLevel::Classic128);
    assert_eq!(params.ring_dimension(), 1 << 13);

    let params = SchemeParameters::new(3, 40, 8).unwrap();
    assert_eq!(params.ring_dimension(), 1 << 14);
}

#[test]
fn evaluation_is_shareable_across_threads() {
    let engine = engine(1, 40, 4);
    let evaluator = engine.evaluator().unwrap();
    let ct = engine.encrypt(&[1.0, 2.0, 3.0, 4.0]).unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (1..=3)
            .map(|k| {
                let evaluator = &evaluator;
                let engine = &engine;
                let ct = &ct;
                s.spawn(move || {
                    let other = engine.encrypt(&[k as f64; 4]).unwrap();
                    evaluator.add(ct, &other).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (k, ct) in (1..=3).zip(results.iter()) {
        let expected: Vec<f64> = [1.0, 2.0, 3.0, 4.0].iter().map(|x| x + k as f64).collect();
        assert_close(&engine.decrypt(ct).unwrap(), &expected, EPS);
    }
}
