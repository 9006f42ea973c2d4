use std::{error::Error, time::Instant};

use ckks_rns::ckks::CkksEngine;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Encrypts two vectors, evaluates x * y + x and the slot total of x, and
/// prints the decrypted results next to the plaintext ones.
fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let x = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];
    let y = [5.0, 4.0, 3.0, 2.0, 1.0, 0.0, -1.0, -2.0];

    let start = Instant::now();
    let mut engine = CkksEngine::new();
    engine.key_gen(2, 40, x.len())?;
    let params = engine.params()?;
    info!(
        "Ring dimension: {}, levels: {}, slots: {}",
        params.ring_dimension(),
        params.mult_depth(),
        params.slots()
    );
    info!("KeyGen time: {:.2?}", start.elapsed());

    let start = Instant::now();
    let ct_x = engine.encrypt(&x)?;
    let ct_y = engine.encrypt(&y)?;
    info!("Encrypt time: {:.2?}", start.elapsed());

    let start = Instant::now();
    let ct_xy = engine.eval_mult(&ct_x, &ct_y)?;
    let ct_x_down = engine.mod_down_to(&ct_x, ct_xy.level())?;
    let ct_res = engine.eval_add(&ct_xy, &ct_x_down)?;
    let ct_sum = engine.eval_sum(&ct_x, x.len())?;
    info!("Evaluation time: {:.2?}", start.elapsed());

    let res = engine.decrypt(&ct_res)?;
    let expected: Vec<f64> = x.iter().zip(y.iter()).map(|(a, b)| a * b + a).collect();
    info!("x * y + x (level {})", ct_res.level());
    for (r, e) in res.iter().zip(expected.iter()) {
        info!("  {:>12.6} expected {:>10.4}", r, e);
    }

    let total = engine.decrypt(&ct_sum)?;
    info!(
        "sum(x) = {:.6}, expected {}",
        total[0],
        x.iter().sum::<f64>()
    );
    Ok(())
}
