// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory fixtures for unit tests: small PDFs built with lopdf and images
// built with the `image` crate.

use image::{Rgba, RgbaImage};
use lopdf::{Dictionary, Object, ObjectId, Stream, dictionary};

use crate::image::ImageProcessor;
use crate::model::{Document, Metadata, Page, PageOrigin, ResourcePool};
use crate::pdf::{load_bytes, objects};

fn rect(w: i64, h: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(w),
        Object::Integer(h),
    ])
}

fn finish(mut doc: lopdf::Document, pages_id: ObjectId) -> Vec<u8> {
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Letter-sized pages sharing one Helvetica resource dictionary, each
/// showing its text at 24pt.
fn text_pages(texts: &[&str]) -> (lopdf::Document, ObjectId) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids = Vec::new();
    for text in texts {
        let content = format!(
            "BT /F1 24 Tf 72 700 Td ({}) Tj ET",
            objects::escape_literal(text.as_bytes())
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => texts.len() as i64,
            "MediaBox" => rect(612, 792),
        }),
    );
    (doc, pages_id)
}

pub(crate) fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
    let (doc, pages_id) = text_pages(texts);
    finish(doc, pages_id)
}

pub(crate) fn pdf_with_title(title: &str) -> Vec<u8> {
    let (mut doc, pages_id) = text_pages(&["titled"]);
    let info = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Author" => Object::string_literal("Fixture"),
    });
    doc.trailer.set("Info", info);
    finish(doc, pages_id)
}

/// One page two levels deep; `/Rotate` and `/MediaBox` live on the ancestors.
pub(crate) fn rotated_tree_pdf(rotate: i64) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let middle_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 10 10 re f".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => middle_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        middle_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => rect(300, 400),
        }),
    );
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(middle_id)],
            "Count" => 1,
            "Rotate" => rotate,
        }),
    );
    finish(doc, root_id)
}

/// 100x100pt page covered by a 2x1 image XObject: red left, blue right.
pub(crate) fn pdf_with_image() -> Vec<u8> {
    pdf_with_image_sized(2, 1)
}

/// The same page with the image dictionary declaring `width` x `height`.
pub(crate) fn pdf_with_image_sized(width: i64, height: i64) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![255, 0, 0, 0, 0, 255],
    ));
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"q 100 0 0 100 0 0 cm /Im0 Do Q".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => rect(100, 100),
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    finish(doc, pages_id)
}

pub(crate) fn document_with_pages(texts: &[&str]) -> Document {
    load_bytes("fixture.pdf", &pdf_with_pages(texts), None).unwrap()
}

/// Single page built straight into the model, with Helvetica as `/F1`.
pub(crate) fn document_from_content(media_box: [f32; 4], content: &str) -> Document {
    let mut pool = ResourcePool::new();
    let font = pool.intern(Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    }));
    let resources = pool.intern(Object::Dictionary(dictionary! {
        "Font" => dictionary! { "F1" => font.reference() },
    }));
    let stream = pool.intern(Object::Stream(Stream::new(
        Dictionary::new(),
        content.as_bytes().to_vec(),
    )));
    let mut page = Page::new(
        media_box,
        PageOrigin {
            source: "built.pdf".into(),
            index: 0,
        },
    );
    page.set_resources(Some(resources));
    page.push_source(stream);
    Document::from_parts(vec![page], Metadata::default(), pool)
}

fn solid(width: u32, height: u32) -> ImageProcessor {
    ImageProcessor::from_rgba(RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255])))
}

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    solid(width, height).to_png_bytes().unwrap()
}

pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    solid(width, height).to_jpeg_bytes(90).unwrap()
}
