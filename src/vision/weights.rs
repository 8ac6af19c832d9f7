// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Weights file format detection
//!
//! Reads the first bytes of a weights file and identifies the serialization
//! format so that backends can reject formats they cannot execute with a
//! message an operator can act on.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of header bytes inspected
const HEADER_LEN: usize = 16;

/// Serialization format of a weights file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    /// ONNX protobuf (`ModelProto`)
    Onnx,
    /// PyTorch checkpoint (zip archive or legacy pickle), e.g. Ultralytics `.pt`
    TorchCheckpoint,
    /// Hugging Face safetensors
    SafeTensors,
    /// llama.cpp GGUF
    Gguf,
    Unknown,
}

impl WeightsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightsFormat::Onnx => "onnx",
            WeightsFormat::TorchCheckpoint => "pytorch",
            WeightsFormat::SafeTensors => "safetensors",
            WeightsFormat::Gguf => "gguf",
            WeightsFormat::Unknown => "unknown",
        }
    }

    /// Operator-facing explanation for a format the ONNX backend cannot run
    pub fn conversion_hint(&self) -> &'static str {
        match self {
            WeightsFormat::Onnx => "ONNX weights are supported by the onnx backend",
            WeightsFormat::TorchCheckpoint => {
                "this is a PyTorch checkpoint trained with Ultralytics; export it to ONNX \
                 (`yolo export model=<weights>.pt format=onnx`) and point the catalog at the .onnx file"
            }
            WeightsFormat::SafeTensors => {
                "safetensors only stores raw tensors without a detection graph; export the model to ONNX"
            }
            WeightsFormat::Gguf => "GGUF files hold language models, not vision detectors",
            WeightsFormat::Unknown => "unrecognized weights format; expected an ONNX model",
        }
    }
}

/// Detect the weights format of a file on disk
pub fn detect_weights_format(path: &Path) -> std::io::Result<WeightsFormat> {
    let mut file = File::open(path)?;
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    Ok(sniff_weights_format(&header[..filled], extension.as_deref()))
}

/// Identify a weights format from its leading bytes, using the file
/// extension only to break ties for the weak ONNX signature
pub fn sniff_weights_format(header: &[u8], extension: Option<&str>) -> WeightsFormat {
    match header {
        // Zip local file header: torch.save since 1.6
        [0x50, 0x4B, 0x03, 0x04, ..] => WeightsFormat::TorchCheckpoint,

        // Legacy pickle protocol 2+
        [0x80, proto, ..] if (2..=5).contains(proto) => WeightsFormat::TorchCheckpoint,

        [b'G', b'G', b'U', b'F', ..] => WeightsFormat::Gguf,

        // u64 little-endian JSON header length followed by '{'
        [_, _, _, _, _, _, 0x00, 0x00, b'{', ..] => WeightsFormat::SafeTensors,

        // ModelProto field 1 (ir_version, varint)
        [0x08, version, ..] if *version > 0 && *version < 0x20 => WeightsFormat::Onnx,

        _ => match extension {
            Some("onnx") if !header.is_empty() => WeightsFormat::Onnx,
            _ => WeightsFormat::Unknown,
        },
    }
}
