use bb84::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<()> {
    println!("BB84 QBER against channel noise (1000 qubits per run)");
    println!();
    println!("{:>7}  {:>8}  {:>8}", "noise", "QBER", "decision");

    let mut rng = StdRng::seed_from_u64(7);
    for percent in [0, 2, 5, 10, 15, 20, 30] {
        let noise = ChannelNoise::new(percent as f64 / 100.0)?;
        let channel = ChannelSimulator::ideal().with_noise(noise);
        let result = sift(&channel.generate(1000, &mut rng)?);
        println!(
            "{:>6}%  {:>7.2}%  {:?}",
            percent,
            result.qber * 100.0,
            decide(result.qber, QBER_THRESHOLD)
        );
    }
    Ok(())
}
