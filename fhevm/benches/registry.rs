use std::time::Instant;

use alloy_primitives::B256;
use fhevm::{
    confidential::{finish_transaction, optimistic_require, verify_ciphertext},
    testing::PlaintextLibrary,
    EvmEnvironment, FheUintType, MemoryHost,
};
use rand::Rng;

const CIPHERTEXTS_PER_FRAME: usize = 64;
const MAX_NESTING: usize = 32;

fn main() {
    println!("VERIFICATION REGISTRY BENCHMARKS");
    for depth in [1, 8, MAX_NESTING] {
        benchmark_nested_frames(depth);
    }
}

fn benchmark_nested_frames(nesting: usize) {
    println!("\tNested frames: {:?}", nesting);
    let lib = PlaintextLibrary::new();
    let mut rng = rand::thread_rng();
    let mut host = MemoryHost::committing();
    host.enter_call(false).unwrap();

    let payloads: Vec<Vec<u8>> = (0..CIPHERTEXTS_PER_FRAME)
        .map(|_| lib.encrypt_bool(rng.gen()))
        .collect();

    let verify_timer = Instant::now();
    let mut hashes: Vec<B256> = Vec::new();
    for level in 0..nesting {
        host.enter_call(false).unwrap();
        for payload in &payloads {
            let entry = verify_ciphertext(&mut host, &lib, FheUintType::Bool, payload).unwrap();
            if level == 0 {
                hashes.push(entry.ciphertext.hash());
            }
        }
    }
    println!("\tVerification time {:?}", verify_timer.elapsed());
    println!("\tLibrary verifications: {:?}", lib.verifications());

    let unwind_timer = Instant::now();
    for level in (0..nesting).rev() {
        // every other frame reverts; the outermost one always returns
        host.exit_call(level != 0 && level % 2 == 0);
    }
    println!("\tUnwind time {:?}", unwind_timer.elapsed());
    println!(
        "\tLive ciphertexts at depth {:?}: {:?}",
        host.depth(),
        host.fhevm_data().verified_ciphertexts().len()
    );

    for hash in &hashes {
        optimistic_require(&mut host, *hash).unwrap();
    }
    let resolve_timer = Instant::now();
    let outcome = finish_transaction(&mut host, &lib);
    println!("\tResolution time {:?}", resolve_timer.elapsed());
    println!("\tTransaction outcome: {:?}", outcome.is_ok());
}
