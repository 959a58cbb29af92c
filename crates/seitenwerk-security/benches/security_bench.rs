// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for fingerprinting and the standard security handler
// in the seitenwerk-security crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use seitenwerk_security::{ProtectionRequest, StandardSecurity, hash_bytes};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Key derivation runs the 50-round MD5 loop twice plus 40 RC4 passes.
fn bench_key_derivation(c: &mut Criterion) {
    let request = ProtectionRequest::new("correct-horse").with_owner_password("battery-staple");
    let file_id = [0x5Au8; 16];

    c.bench_function("standard_security_new", |b| {
        b.iter(|| {
            let security =
                StandardSecurity::new(black_box(&request), black_box(&file_id)).expect("derive");
            black_box(security);
        });
    });
}

/// Per-object RC4 over a 64 KiB content stream.
fn bench_object_cipher(c: &mut Criterion) {
    let security = StandardSecurity::new(&ProtectionRequest::new("pw"), &[1u8; 16]).expect("derive");
    let mut data = vec![0x42u8; 64 * 1024];

    c.bench_function("object_cipher (64 KiB)", |b| {
        b.iter(|| {
            security.apply_object_cipher(black_box(12), 0, &mut data);
        });
    });
}

/// SHA-256 fingerprinting at sizes typical of page content streams.
fn bench_integrity_hash(c: &mut Criterion) {
    let sizes: &[(&str, usize)] = &[
        ("1 KiB", 1024),
        ("100 KiB", 100 * 1024),
        ("1 MiB", 1024 * 1024),
    ];

    let mut group = c.benchmark_group("integrity_hash_sha256");
    for &(label, size) in sizes {
        let data = vec![0xABu8; size];
        group.bench_function(label, |b| {
            b.iter(|| black_box(hash_bytes(black_box(&data))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_key_derivation,
    bench_object_cipher,
    bench_integrity_hash,
);
criterion_main!(benches);
