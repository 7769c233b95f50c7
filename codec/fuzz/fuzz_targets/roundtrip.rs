#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use packwire_codec::{
    bits::{Reader, Writer},
    composite, decode, encode, range,
    tag::Tag,
};

const RESOLUTIONS: [f32; 5] = [0.001, 0.01, 0.25, 1.0, 7.5];

#[derive(Debug, Default, PartialEq)]
struct Pair {
    a: i32,
    b: i32,
}

composite! {
    Pair {
        a => "1",
        b => "7,min=-8,max=7",
    }
}

#[derive(Debug, Default)]
struct Sample {
    id: i32,
    x: f32,
    heading: f32,
    pair: Pair,
}

composite! {
    Sample {
        id => "1,min=0,max=1023",
        x => "2",
        heading => Tag::new(3).min(0).max(360).resolution(0.5),
        pair => "4",
    }
}

#[derive(Arbitrary, Debug)]
enum FuzzInput<'a> {
    Bits(Vec<(u32, u8)>),
    Integer { value: i32, min: i32, max: i32 },
    Float(f32),
    Compressed {
        value: f32,
        min: i16,
        max: i16,
        resolution: u8,
    },
    Composite {
        id: u16,
        x: f32,
        heading: f32,
        a: i32,
        b: i8,
    },
    Decode(&'a [u8]),
}

fn roundtrip_bits(values: Vec<(u32, u8)>) {
    let values: Vec<(u32, u32)> = values
        .into_iter()
        .map(|(value, bits)| {
            let bits = u32::from(bits) % 32 + 1;
            let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
            (value & mask, bits)
        })
        .collect();

    let mut writer = Writer::new();
    for &(value, bits) in &values {
        writer.write(value, bits).expect("failed to write bits");
    }
    let total = writer.bits_written();
    writer.finalize().expect("failed to finalize");
    let bytes = writer.into_bytes();
    assert_eq!(bytes.len() % 4, 0);
    assert_eq!(bytes.len() * 8, total.div_ceil(32) * 32);

    let mut reader = Reader::new(bytes, total);
    for &(value, bits) in &values {
        assert_eq!(reader.read(bits).expect("failed to read bits"), value);
    }
    assert_eq!(reader.remaining_bits(), 0);
}

fn roundtrip_integer(value: i32, min: i32, max: i32) {
    let mut writer = Writer::new();
    if range::write_integer(&mut writer, value, min, max).is_err() {
        assert!(min >= max || value < min || value > max);
        return;
    }
    let total = writer.bits_written();
    writer.finalize().expect("failed to finalize");

    let mut reader = Reader::new(writer.into_bytes(), total);
    let decoded = range::read_integer(&mut reader, min, max).expect("failed to read integer");
    assert_eq!(decoded, value);
}

fn roundtrip_float(value: f32) {
    let mut writer = Writer::new();
    range::write_float(&mut writer, value).expect("failed to write float");
    writer.finalize().expect("failed to finalize");

    let mut reader = Reader::new(writer.into_bytes(), 32);
    let decoded = range::read_float(&mut reader).expect("failed to read float");
    assert_eq!(decoded.to_bits(), value.to_bits());
}

fn roundtrip_compressed(value: f32, min: i16, max: i16, resolution: u8) {
    let (min, max) = (f32::from(min), f32::from(max));
    let resolution = RESOLUTIONS[usize::from(resolution) % RESOLUTIONS.len()];

    let mut writer = Writer::new();
    if range::write_compressed_float(&mut writer, value, min, max, resolution).is_err() {
        assert!(value.is_nan() || min >= max);
        return;
    }
    let total = writer.bits_written();
    writer.finalize().expect("failed to finalize");

    let mut reader = Reader::new(writer.into_bytes(), total);
    let decoded = range::read_compressed_float(&mut reader, min, max, resolution)
        .expect("failed to read compressed float");
    assert!((min..=max).contains(&decoded));

    let expected = f64::from(value.clamp(min, max));
    let tolerance = f64::from(resolution) / 2.0 + f64::from(max - min) * 1e-6;
    assert!((f64::from(decoded) - expected).abs() <= tolerance);
}

fn roundtrip_composite(id: u16, x: f32, heading: f32, a: i32, b: i8) {
    let sample = Sample {
        id: i32::from(id % 1024),
        x,
        heading,
        pair: Pair {
            a,
            b: i32::from(b.clamp(-8, 7)),
        },
    };
    let bytes = match encode(&sample) {
        Ok(bytes) => bytes,
        Err(_) => {
            assert!(heading.is_nan());
            return;
        }
    };

    let mut decoded = Sample::default();
    decode(bytes, &mut decoded).expect("failed to decode a successfully encoded input");
    assert_eq!(decoded.id, sample.id);
    assert_eq!(decoded.x.to_bits(), sample.x.to_bits());
    assert!((0.0..=360.0).contains(&decoded.heading));
    assert_eq!(decoded.pair, sample.pair);
}

fn decode_arbitrary(data: &[u8]) {
    let aligned = &data[..data.len() - data.len() % 4];
    let _ = decode(Bytes::copy_from_slice(aligned), &mut Sample::default());
    let _ = decode(aligned, &mut 0i32);
    let _ = decode(aligned, &mut 0f32);
}

fn fuzz(input: FuzzInput) {
    match input {
        FuzzInput::Bits(values) => roundtrip_bits(values),
        FuzzInput::Integer { value, min, max } => roundtrip_integer(value, min, max),
        FuzzInput::Float(value) => roundtrip_float(value),
        FuzzInput::Compressed {
            value,
            min,
            max,
            resolution,
        } => roundtrip_compressed(value, min, max, resolution),
        FuzzInput::Composite {
            id,
            x,
            heading,
            a,
            b,
        } => roundtrip_composite(id, x, heading, a, b),
        FuzzInput::Decode(data) => decode_arbitrary(data),
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
