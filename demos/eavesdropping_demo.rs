use bb84::prelude::*;

fn run(eve: bool, seed: u64) -> Result<()> {
    let config = ProtocolConfig::new(1000, eve)?.with_seed(seed);
    let mut protocol = Bb84Protocol::new(config)?;

    protocol.transmit()?;
    let sifted = protocol.sift()?;
    let decision = protocol.reconcile()?;

    println!(
        "eve {:<5}  sifted {:>4}  errors {:>4}  QBER {:>6.2}%  -> {:?}",
        eve,
        sifted.len(),
        sifted.errors,
        sifted.qber * 100.0,
        decision
    );
    Ok(())
}

fn main() -> Result<()> {
    println!("BB84 eavesdropping detection (intercept-resend, 1000 qubits)");
    println!(
        "expected QBER with Eve: {:.0}%, abort threshold {:.0}%",
        EveStrategy::full_intercept().expected_qber() * 100.0,
        QBER_THRESHOLD * 100.0
    );
    println!();
    for seed in 0..3 {
        run(false, seed)?;
        run(true, seed)?;
    }
    Ok(())
}
