use bb84::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(2024);
    let n = 12;

    let transmission = generate_transmission(n, false, &mut rng)?;

    println!("{:>3}  {:>5} {:>5}  {:>5} {:>5}  kept", "#", "A bit", "A bas", "B bas", "B bit");
    for r in transmission.iter() {
        println!(
            "{:>3}  {:>5} {:>5}  {:>5} {:>5}  {}",
            r.index,
            r.alice_bit as u8,
            r.alice_basis,
            r.bob_basis,
            r.bob_bit as u8,
            if r.bases_match() { "yes" } else { "" }
        );
    }

    let sifted = sift(&transmission);
    println!();
    println!("Sifted key:  {} ({} bits)", sifted.sifted_key(), sifted.len());
    println!("Bob's key:   {}", sifted.bob_key());
    println!("QBER:        {:.2}%", sifted.qber * 100.0);
    println!("Decision:    {:?}", decide(sifted.qber, QBER_THRESHOLD));

    let final_key = amplify(&sifted.sifted_key());
    println!("Final key:   {} ({} bits)", final_key, final_key.len());
    Ok(())
}
