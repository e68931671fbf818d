use bb84::prelude::*;

fn main() -> Result<()> {
    let mut config = ProtocolConfig::new(500, false)?.with_seed(99);
    config.cipher_mode = CipherMode::DerivedAead;
    config.amplifier = AmplifierKind::Hmac;

    let mut protocol = Bb84Protocol::new(config)?;
    let report = protocol.run_to_completion()?;
    println!(
        "Quantum key: {} bits sifted, {} bits after {} amplification",
        report.sifted_length,
        protocol.final_key().map(|k| k.len()).unwrap_or(0),
        report.amplifier
    );

    protocol.derive_cipher_key()?;
    let message = "Your secret message";
    let sealed = protocol.encrypt(message)?;
    println!("Cipher text: {}", sealed.cipher_text);

    let decrypted = protocol.decrypt(&sealed)?;
    assert_eq!(decrypted, message);
    println!("Success! The message was correctly encrypted and decrypted using a quantum key.");
    Ok(())
}
