// 出力の後処理: 参照されないオブジェクトの除去と、未圧縮ストリームのFlate圧縮

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object};

/// フィルター未設定の空でないストリームをFlateDecodeで圧縮する。
///
/// 対象は取り込んだページ内容（展開済み）と生成した描画ストリーム。
/// DCTDecode等が既に付いた画像は触らない。圧縮したストリーム数を返す。
pub fn compress_streams(doc: &mut Document) -> usize {
    let mut compressed = 0;
    for object in doc.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if stream.dict.has(b"Filter") || stream.content.is_empty() {
            continue;
        }
        if let Some(deflated) = deflate(&stream.content) {
            stream.dict.set("Filter", "FlateDecode");
            stream.set_content(deflated);
            compressed += 1;
        }
    }
    compressed
}

fn deflate(content: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(content.len() / 2), Compression::default());
    encoder.write_all(content).ok()?;
    encoder.finish().ok()
}

/// Rootから辿れないオブジェクトを除去し、除去数を返す。
///
/// 取り込み時に複製した元PDFのページツリー由来の残骸が主な対象。
pub fn delete_unused_objects(doc: &mut Document) -> usize {
    doc.prune_objects().len()
}

/// 保存直前の後処理。除去してから圧縮する。
pub fn optimize(doc: &mut Document) {
    let pruned = delete_unused_objects(doc);
    let compressed = compress_streams(doc);
    tracing::debug!(
        pruned,
        compressed,
        objects = doc.objects.len(),
        "output optimized"
    );
}
