//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

/// One array stored in a fixture archive
pub struct Member {
    pub name: &'static str,
    pub descr: &'static str,
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

impl Member {
    pub fn i64s(name: &'static str, values: &[i64]) -> Self {
        Self {
            name,
            descr: "<i8",
            shape: vec![values.len()],
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    pub fn f64s(name: &'static str, values: &[f64]) -> Self {
        Self {
            name,
            descr: "<f8",
            shape: vec![values.len()],
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// `datetime64[ns]` column
    pub fn nanos(name: &'static str, values: &[i64]) -> Self {
        Self {
            descr: "<M8[ns]",
            ..Self::i64s(name, values)
        }
    }

    /// Null-terminated UTF-8 strings packed into one `uint8` buffer
    pub fn strings(name: &'static str, values: &[&str]) -> Self {
        let mut data = Vec::new();
        for v in values {
            data.extend_from_slice(v.as_bytes());
            data.push(0);
        }
        Self::raw_bytes(name, data)
    }

    pub fn raw_bytes(name: &'static str, data: Vec<u8>) -> Self {
        Self {
            name,
            descr: "|u1",
            shape: vec![data.len()],
            data,
        }
    }
}

/// Encode a version 1.0 `.npy` payload
pub fn npy(descr: &str, shape: &[usize], data: &[u8]) -> Vec<u8> {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    let shape = if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape
    );
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    out
}

/// Write an `.npz` archive holding `members` to `path`
pub fn write_npz(path: &Path, members: &[Member]) {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for m in members {
        zip.start_file(format!("{}.npy", m.name), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&npy(m.descr, &m.shape, &m.data)).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

/// A small archive with every transaction column
pub fn transaction_members() -> Vec<Member> {
    vec![
        Member::i64s("id_transaction", &[1, 2, 3]),
        Member::nanos(
            "date_transaction",
            &[
                1_388_485_551_804_819_123,
                1_420_070_400_000_000_000,
                1_451_606_400_500_000_000,
            ],
        ),
        Member::f64s("prix", &[250_000.0, 98_500.5, 1_200_000.0]),
        Member::strings("departement", &["75", "69", "06"]),
        Member::i64s("id_ville", &[75056, 69123, 6088]),
        Member::strings("ville", &["Paris", "Lyon", "Nice"]),
        Member::i64s("code_postal", &[75001, 69002, 6000]),
        Member::strings(
            "adresse",
            &["1 rue de Rivoli", "2 quai Saint-Antoine", "3 promenade des Anglais"],
        ),
        Member::strings("type_batiment", &["Appartement", "Maison", "Appartement"]),
        Member::i64s("n_pieces", &[3, 5, 2]),
        Member::f64s("surface_habitable", &[65.0, 120.5, 42.0]),
        Member::f64s("latitude", &[48.86, 45.76, 43.70]),
        Member::f64s("longitude", &[2.34, 4.83, 7.27]),
        Member::strings("notes", &["ignored"]),
    ]
}
