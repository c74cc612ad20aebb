//! Programmatic GLB fixtures for integration tests.
//!
//! Scene layout:
//! - `Armature` (untagged, offset and scaled) -> `hips` -> `spine`, plus a
//!   loose `Prop` node
//! - one skin with joints `hips`, `spine`
//! - `Armature|Walk`: hips translation over three keys, spine rotation
//! - `Wave`: moves `Prop`, an animated node outside the skin

#![allow(dead_code)]

use glam::Quat;
use serde_json::json;

/// Spine rotation at the last key of `Walk`
pub fn walk_spine_end() -> Quat {
    Quat::from_rotation_y(0.5)
}

fn push_f32s(buffer: &mut Vec<u8>, values: &[f32]) -> (usize, usize) {
    let offset = buffer.len();
    for v in values {
        buffer.extend_from_slice(&v.to_le_bytes());
    }
    (offset, values.len() * 4)
}

/// Generate the animated GLB described above
pub fn generate_animated_glb() -> Vec<u8> {
    let mut buffer = Vec::new();
    let spine_end = walk_spine_end();

    let views = [
        push_f32s(&mut buffer, &[0.0, 0.5, 1.0]),
        push_f32s(
            &mut buffer,
            &[0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 2.0],
        ),
        push_f32s(&mut buffer, &[0.0, 1.0]),
        push_f32s(
            &mut buffer,
            &[
                0.0, 0.0, 0.0, 1.0, spine_end.x, spine_end.y, spine_end.z, spine_end.w,
            ],
        ),
        push_f32s(&mut buffer, &[0.0, 0.0, 0.0, 3.0, 0.0, 0.0]),
    ];

    let buffer_views: Vec<_> = views
        .iter()
        .map(|(offset, length)| json!({ "buffer": 0, "byteOffset": offset, "byteLength": length }))
        .collect();

    let root = json!({
        "asset": { "version": "2.0", "generator": "nether-anim-export tests" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 3] }],
        "nodes": [
            {
                "name": "Armature",
                "translation": [0.0, 0.0, 1.0],
                "scale": [0.5, 0.5, 0.5],
                "children": [1]
            },
            { "name": "hips", "translation": [0.0, 1.0, 0.0], "children": [2] },
            { "name": "spine", "translation": [0.0, 0.5, 0.0] },
            { "name": "Prop" }
        ],
        "skins": [{ "joints": [1, 2] }],
        "buffers": [{ "byteLength": buffer.len() }],
        "bufferViews": buffer_views,
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "SCALAR", "min": [0.0], "max": [1.0] },
            { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0] },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC4" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "animations": [
            {
                "name": "Armature|Walk",
                "samplers": [
                    { "input": 0, "output": 1, "interpolation": "LINEAR" },
                    { "input": 2, "output": 3, "interpolation": "LINEAR" }
                ],
                "channels": [
                    { "sampler": 0, "target": { "node": 1, "path": "translation" } },
                    { "sampler": 1, "target": { "node": 2, "path": "rotation" } }
                ]
            },
            {
                "name": "Wave",
                "samplers": [{ "input": 2, "output": 4, "interpolation": "LINEAR" }],
                "channels": [{ "sampler": 0, "target": { "node": 3, "path": "translation" } }]
            }
        ]
    });

    let json_bytes = serde_json::to_vec(&root).expect("Failed to serialize JSON");
    assemble_glb(&json_bytes, &buffer)
}

/// Assemble the final GLB binary
pub fn assemble_glb(json_bytes: &[u8], buffer_data: &[u8]) -> Vec<u8> {
    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;

    // Pad buffer to 4-byte alignment
    let buffer_padding = (4 - (buffer_data.len() % 4)) % 4;
    let buffer_chunk_length = buffer_data.len() + buffer_padding;

    let total_length = 12 + 8 + json_chunk_length + 8 + buffer_chunk_length;
    let mut glb = Vec::with_capacity(total_length);

    // Header
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    // BIN chunk
    glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
    glb.extend_from_slice(buffer_data);
    glb.extend(std::iter::repeat_n(0u8, buffer_padding));

    glb
}

/// Write the fixture into `dir` and return its path
pub fn write_animated_glb(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("hero.glb");
    std::fs::write(&path, generate_animated_glb()).expect("Failed to write GLB");
    path
}
