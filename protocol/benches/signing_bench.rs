// Signing & verification benchmarks for the ProxiPay protocol.
//
// Covers payer key derivation, payload signing and verification, and ack
// signing and verification at increasing payload counts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use proxipay_protocol::clock::{RandomIds, SystemClock};
use proxipay_protocol::crypto::{derive, DerivationContext, KeyMaterial};
use proxipay_protocol::discovery::VendorAdvertisement;
use proxipay_protocol::exchange::{build_and_sign, verify_ack, AckBody, SignedPayload};
use proxipay_protocol::Amount;

fn vendor_keys() -> KeyMaterial {
    derive(&DerivationContext::vendor("vendor-bridge", "a1b2c3"), "RX-4421")
}

fn advert(keys: &KeyMaterial) -> VendorAdvertisement {
    VendorAdvertisement {
        id: "vendor-bridge".into(),
        receiver_id: "RX-4421".into(),
        session_nonce: "nonce-bench".into(),
        profile_hash: "a1b2c3".into(),
        short_code: "441".into(),
        signal_strength: -48,
        vendor_public_key: keys.public_key_hex().to_string(),
        certificate: keys.certificate_hex().to_string(),
    }
}

fn payer_keys() -> KeyMaterial {
    derive(&DerivationContext::payer("user-bench", "1234"), "user-bench")
}

fn bench_derive_payer_keys(c: &mut Criterion) {
    let context = DerivationContext::payer("user-bench", "1234");
    c.bench_function("derivation/payer_key_material", |b| {
        b.iter(|| derive(&context, "user-bench"));
    });
}

fn bench_build_and_sign(c: &mut Criterion) {
    let vendor = advert(&vendor_keys());
    let keys = payer_keys();

    c.bench_function("payload/build_and_sign", |b| {
        b.iter(|| {
            build_and_sign(&vendor, Amount::from(50), "user-bench", Some("Bench"), &keys, &SystemClock, &RandomIds)
                .unwrap()
        });
    });
}

fn bench_verify_payloads(c: &mut Criterion) {
    let vendor = advert(&vendor_keys());
    let keys = payer_keys();
    let mut group = c.benchmark_group("payload/verify");

    for size in [1, 10, 100] {
        let payloads: Vec<SignedPayload> = (0..size)
            .map(|i| {
                build_and_sign(&vendor, Amount::from(10 + i), "user-bench", None, &keys, &SystemClock, &RandomIds)
                    .unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payloads, |b, payloads| {
            b.iter(|| payloads.iter().all(SignedPayload::verify_signature));
        });
    }

    group.finish();
}

fn bench_verify_ack(c: &mut Criterion) {
    let keys = vendor_keys();
    let vendor = advert(&keys);
    let ack = AckBody {
        ack_id: "ack-bench".into(),
        payload_id: "txn-bench".into(),
        vendor_id: "RX-4421".into(),
        session_nonce: "nonce-bench".into(),
        timestamp: "2026-01-01T00:00:00.000Z".into(),
    }
    .sign(&keys)
    .unwrap();

    c.bench_function("ack/verify", |b| {
        b.iter(|| verify_ack(&ack, &vendor).unwrap());
    });
}

criterion_group!(
    benches,
    bench_derive_payer_keys,
    bench_build_and_sign,
    bench_verify_payloads,
    bench_verify_ack,
);
criterion_main!(benches);
