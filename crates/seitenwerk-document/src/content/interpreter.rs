// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content stream interpreter.
//
// Walks a page's operators with a graphics-state stack and reports painted
// paths, images and positioned glyphs to a `ContentSink`. The rasterizer and
// the direct text extractor are both sinks. Clipping, shadings, patterns and
// inline images are not modelled.

use std::collections::HashMap;
use std::rc::Rc;

use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream};
use seitenwerk_core::Color;
use seitenwerk_core::error::Result;
use tracing::{debug, warn};

use super::fonts::FontInfo;
use super::images;
use crate::model::{Document, ResourceId, ResourcePool};
use crate::pdf::objects;

const MAX_FORM_DEPTH: usize = 12;
const CURVE_SEGMENTS: usize = 12;

/// Affine transform `[a b c d e f]` mapping `(x, y)` to
/// `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation in user space.
    pub fn rotate_degrees(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self` applied first, then `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < f32::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    /// Average linear scale factor.
    pub fn expansion(&self) -> f32 {
        self.determinant().abs().sqrt()
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f32> = operands.iter().filter_map(objects::number).collect();
        match v.as_slice() {
            [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub alpha: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// One subpath with curves flattened, in output coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subpath {
    pub points: Vec<(f32, f32)>,
    pub closed: bool,
}

/// A positioned glyph in output coordinates.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub text: String,
    /// Baseline origin.
    pub origin: (f32, f32),
    /// Glyph box corners: bottom-left, bottom-right, top-right, top-left.
    pub quad: [(f32, f32); 4],
    /// Advance along the baseline.
    pub advance: f32,
}

#[derive(Debug, Clone)]
pub struct TextRun {
    pub glyphs: Vec<Glyph>,
    /// Em height in output units.
    pub font_size: f32,
    /// `Tr` value; 3 and 7 paint nothing.
    pub render_mode: u8,
    pub paint: Paint,
}

impl TextRun {
    pub fn is_invisible(&self) -> bool {
        matches!(self.render_mode, 3 | 7)
    }
}

/// Receives what the interpreter paints. Every method defaults to a no-op.
pub trait ContentSink {
    fn fill_path(&mut self, _path: &[Subpath], _rule: FillRule, _paint: Paint) {}

    fn stroke_path(&mut self, _path: &[Subpath], _width: f32, _paint: Paint) {}

    /// `placement` maps the image's unit square onto output space.
    fn draw_image(&mut self, _image: &RgbaImage, _placement: &Matrix, _alpha: f32) {}

    fn show_text(&mut self, _run: &TextRun) {}

    /// Sinks that ignore images return false to skip decoding them.
    fn wants_images(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct TextState {
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    font: Option<Rc<FontInfo>>,
    font_size: f32,
    rise: f32,
    render_mode: u8,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 12.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    stroke: Color,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    text: TextState,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            text: TextState::default(),
        }
    }
}

/// Interpret page `page_index` of `document`, reporting to `sink` in the
/// coordinate space given by `base` (user space → output).
///
/// Source content runs first in its own saved state; overlay layers run
/// afterwards from the initial state.
pub fn run_page<S: ContentSink>(
    document: &Document,
    page_index: usize,
    base: Matrix,
    sink: &mut S,
    max_image_pixels: u64,
) -> Result<()> {
    let page = document.page(page_index)?;
    let pool = document.pool();
    let resources = page.effective_resources(pool);
    let mut interpreter = Interpreter::new(pool, sink, base, max_image_pixels);

    interpreter.run_isolated(&document.page_content(page_index)?, &resources);
    if page.has_overlays() {
        interpreter.run_isolated(&document.overlay_content(page_index)?, &resources);
    }
    Ok(())
}

struct Interpreter<'a, S: ContentSink> {
    pool: &'a ResourcePool,
    sink: &'a mut S,
    base: Matrix,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    path: Vec<Subpath>,
    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    fonts: HashMap<ResourceId, Rc<FontInfo>>,
    fallback_font: Rc<FontInfo>,
    forms: Vec<ResourceId>,
    max_image_pixels: u64,
}

impl<'a, S: ContentSink> Interpreter<'a, S> {
    fn new(pool: &'a ResourcePool, sink: &'a mut S, base: Matrix, max_image_pixels: u64) -> Self {
        Self {
            pool,
            sink,
            base,
            state: GraphicsState::new(base),
            stack: Vec::new(),
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            fonts: HashMap::new(),
            fallback_font: Rc::new(FontInfo::default()),
            forms: Vec::new(),
            max_image_pixels,
        }
    }

    fn run_isolated(&mut self, bytes: &[u8], resources: &Dictionary) {
        self.state = GraphicsState::new(self.base);
        self.stack.clear();
        self.clear_path();
        self.run(bytes, resources);
    }

    fn run(&mut self, bytes: &[u8], resources: &Dictionary) {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        let content = match Content::decode(bytes) {
            Ok(content) => content,
            Err(err) => {
                warn!(%err, "Cannot tokenise content stream, skipping it");
                return;
            }
        };
        for operation in &content.operations {
            self.execute(operation, resources);
        }
    }

    fn execute(&mut self, op: &Operation, resources: &Dictionary) {
        let nums: Vec<f32> = op.operands.iter().filter_map(objects::number).collect();
        let n = |i: usize| nums.get(i).copied().unwrap_or(0.0);
        match op.operator.as_str() {
            // graphics state
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "w" => self.state.line_width = n(0).max(0.0),
            "gs" => self.apply_ext_gstate(op, resources),

            // colour
            "g" => self.state.fill = gray(n(0)),
            "G" => self.state.stroke = gray(n(0)),
            "rg" => self.state.fill = Color::rgb(n(0), n(1), n(2)).clamped(),
            "RG" => self.state.stroke = Color::rgb(n(0), n(1), n(2)).clamped(),
            "k" => self.state.fill = cmyk(n(0), n(1), n(2), n(3)),
            "K" => self.state.stroke = cmyk(n(0), n(1), n(2), n(3)),
            "cs" => self.state.fill = Color::BLACK,
            "CS" => self.state.stroke = Color::BLACK,
            "sc" | "scn" => {
                if let Some(c) = color_from_components(&nums) {
                    self.state.fill = c;
                }
            }
            "SC" | "SCN" => {
                if let Some(c) = color_from_components(&nums) {
                    self.state.stroke = c;
                }
            }

            // path construction
            "m" => self.move_to(n(0), n(1)),
            "l" => self.line_to(n(0), n(1)),
            "c" => self.curve_to((n(0), n(1)), (n(2), n(3)), (n(4), n(5))),
            "v" => {
                let p1 = self.current_point.unwrap_or((n(0), n(1)));
                self.curve_to(p1, (n(0), n(1)), (n(2), n(3)));
            }
            "y" => self.curve_to((n(0), n(1)), (n(2), n(3)), (n(2), n(3))),
            "h" => self.close_subpath(),
            "re" => self.rectangle(n(0), n(1), n(2), n(3)),

            // path painting
            "f" | "F" => self.paint(Some(FillRule::NonZero), false, false),
            "f*" => self.paint(Some(FillRule::EvenOdd), false, false),
            "S" => self.paint(None, true, false),
            "s" => self.paint(None, true, true),
            "B" => self.paint(Some(FillRule::NonZero), true, false),
            "B*" => self.paint(Some(FillRule::EvenOdd), true, false),
            "b" => self.paint(Some(FillRule::NonZero), true, true),
            "b*" => self.paint(Some(FillRule::EvenOdd), true, true),
            "n" => self.clear_path(),
            "W" | "W*" => {}

            // text
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => {}
            "Tc" => self.state.text.char_spacing = n(0),
            "Tw" => self.state.text.word_spacing = n(0),
            "Tz" => self.state.text.horizontal_scale = n(0) / 100.0,
            "TL" => self.state.text.leading = n(0),
            "Ts" => self.state.text.rise = n(0),
            "Tr" => self.state.text.render_mode = n(0).clamp(0.0, 7.0) as u8,
            "Tf" => self.set_font(op, resources),
            "Td" => self.next_line(n(0), n(1)),
            "TD" => {
                self.state.text.leading = -n(1);
                self.next_line(n(0), n(1));
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(0.0, -self.state.text.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show_string(bytes);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.text.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show_string(bytes);
                }
            }
            "\"" => {
                self.state.text.word_spacing = n(0);
                self.state.text.char_spacing = n(1);
                self.next_line(0.0, -self.state.text.leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show_string(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    self.show_array(items);
                }
            }

            // external objects
            "Do" => {
                if let Some(name) = op.operands.first().and_then(objects::name) {
                    self.paint_xobject(name, resources);
                }
            }
            _ => {}
        }
    }

    fn device(&self, x: f32, y: f32) -> (f32, f32) {
        self.state.ctm.apply(x, y)
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let point = self.device(x, y);
        self.path.push(Subpath {
            points: vec![point],
            closed: false,
        });
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if self.current_point.is_none() {
            self.move_to(x, y);
            return;
        }
        let point = self.device(x, y);
        if let Some(subpath) = self.path.last_mut() {
            subpath.points.push(point);
        }
        self.current_point = Some((x, y));
    }

    fn curve_to(&mut self, p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) {
        let Some(p0) = self.current_point else {
            self.move_to(p3.0, p3.1);
            return;
        };
        for step in 1..=CURVE_SEGMENTS {
            let t = step as f32 / CURVE_SEGMENTS as f32;
            let u = 1.0 - t;
            let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            let x = w0 * p0.0 + w1 * p1.0 + w2 * p2.0 + w3 * p3.0;
            let y = w0 * p0.1 + w1 * p1.1 + w2 * p2.1 + w3 * p3.1;
            let point = self.device(x, y);
            if let Some(subpath) = self.path.last_mut() {
                subpath.points.push(point);
            }
        }
        self.current_point = Some(p3);
    }

    fn close_subpath(&mut self) {
        if let Some(subpath) = self.path.last_mut() {
            subpath.closed = true;
        }
        self.current_point = self.subpath_start;
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close_subpath();
    }

    fn clear_path(&mut self) {
        self.path.clear();
        self.current_point = None;
        self.subpath_start = None;
    }

    fn paint(&mut self, fill: Option<FillRule>, stroke: bool, close: bool) {
        if close {
            self.close_subpath();
        }
        let path = std::mem::take(&mut self.path);
        if let Some(rule) = fill {
            let paint = Paint {
                color: self.state.fill,
                alpha: self.state.fill_alpha,
            };
            self.sink.fill_path(&path, rule, paint);
        }
        if stroke {
            let paint = Paint {
                color: self.state.stroke,
                alpha: self.state.stroke_alpha,
            };
            let width = self.state.line_width * self.state.ctm.expansion();
            self.sink.stroke_path(&path, width, paint);
        }
        self.clear_path();
    }

    fn apply_ext_gstate(&mut self, op: &Operation, resources: &Dictionary) {
        let pool = self.pool;
        let Some(name) = op.operands.first().and_then(objects::name) else {
            return;
        };
        let Some(gs) = pool
            .lookup(resources, b"ExtGState")
            .and_then(|all| pool.dict(all))
            .and_then(|all| all.get(name).ok())
            .and_then(|entry| pool.dict(entry))
        else {
            debug!(name = %String::from_utf8_lossy(name), "Unknown ExtGState");
            return;
        };
        if let Some(ca) = pool.lookup(gs, b"ca").and_then(objects::number) {
            self.state.fill_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(ca) = pool.lookup(gs, b"CA").and_then(objects::number) {
            self.state.stroke_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(lw) = pool.lookup(gs, b"LW").and_then(objects::number) {
            self.state.line_width = lw.max(0.0);
        }
    }

    fn set_font(&mut self, op: &Operation, resources: &Dictionary) {
        if let Some(size) = op.operands.get(1).and_then(objects::number) {
            self.state.text.font_size = size;
        }
        let Some(name) = op.operands.first().and_then(objects::name) else {
            return;
        };
        self.state.text.font = self.load_font(resources, name);
        if self.state.text.font.is_none() {
            debug!(font = %String::from_utf8_lossy(name), "Font not found, using fallback metrics");
        }
    }

    fn load_font(&mut self, resources: &Dictionary, name: &[u8]) -> Option<Rc<FontInfo>> {
        let pool = self.pool;
        let fonts = pool.lookup(resources, b"Font").and_then(|f| pool.dict(f))?;
        let entry = fonts.get(name).ok()?;
        match ResourceId::from_reference(entry) {
            Some(id) => {
                if let Some(cached) = self.fonts.get(&id) {
                    return Some(Rc::clone(cached));
                }
                let info = Rc::new(FontInfo::from_dict(pool, pool.dict_by_id(id)?));
                self.fonts.insert(id, Rc::clone(&info));
                Some(info)
            }
            None => pool.dict(entry).map(|d| Rc::new(FontInfo::from_dict(pool, d))),
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn show_string(&mut self, bytes: &[u8]) {
        let font = self
            .state
            .text
            .font
            .clone()
            .unwrap_or_else(|| Rc::clone(&self.fallback_font));
        let text = self.state.text.clone();
        let size = text.font_size;
        let scale = Matrix::new(size * text.horizontal_scale, 0.0, 0.0, size, 0.0, text.rise);

        let start = scale.then(&self.text_matrix).then(&self.state.ctm);
        let font_size = start.c.hypot(start.d);
        let mut glyphs = Vec::with_capacity(bytes.len());
        for code in font.codes(bytes) {
            let w = font.width(code) / 1000.0;
            let trm = scale.then(&self.text_matrix).then(&self.state.ctm);
            let origin = trm.apply(0.0, 0.0);
            let end = trm.apply(w, 0.0);
            glyphs.push(Glyph {
                text: font.unicode(code),
                origin,
                quad: [
                    trm.apply(0.0, -0.2),
                    trm.apply(w, -0.2),
                    trm.apply(w, 0.8),
                    trm.apply(0.0, 0.8),
                ],
                advance: (end.0 - origin.0).hypot(end.1 - origin.1),
            });
            let word = if font.is_word_space(code) {
                text.word_spacing
            } else {
                0.0
            };
            let tx = (w * size + text.char_spacing + word) * text.horizontal_scale;
            self.text_matrix = Matrix::translate(tx, 0.0).then(&self.text_matrix);
        }
        if glyphs.is_empty() {
            return;
        }
        let run = TextRun {
            glyphs,
            font_size,
            render_mode: text.render_mode,
            paint: Paint {
                color: self.state.fill,
                alpha: self.state.fill_alpha,
            },
        };
        self.sink.show_text(&run);
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show_string(bytes),
                other => {
                    if let Some(adjust) = objects::number(other) {
                        let text = &self.state.text;
                        let tx = -adjust / 1000.0 * text.font_size * text.horizontal_scale;
                        self.text_matrix = Matrix::translate(tx, 0.0).then(&self.text_matrix);
                    }
                }
            }
        }
    }

    fn paint_xobject(&mut self, name: &[u8], resources: &Dictionary) {
        let pool = self.pool;
        let Some(id) = pool
            .lookup(resources, b"XObject")
            .and_then(|all| pool.dict(all))
            .and_then(|all| all.get(name).ok())
            .and_then(ResourceId::from_reference)
        else {
            debug!(name = %String::from_utf8_lossy(name), "Unknown XObject");
            return;
        };
        let Some(stream) = pool.stream(id) else {
            return;
        };
        match pool.lookup(&stream.dict, b"Subtype").and_then(objects::name) {
            Some(b"Image") => {
                if !self.sink.wants_images() {
                    return;
                }
                if let Some(bitmap) =
                    images::decode_image(pool, stream, self.state.fill, self.max_image_pixels)
                {
                    self.sink
                        .draw_image(&bitmap, &self.state.ctm, self.state.fill_alpha);
                }
            }
            Some(b"Form") => self.run_form(id, stream, resources),
            _ => {}
        }
    }

    fn run_form(&mut self, id: ResourceId, stream: &'a Stream, resources: &Dictionary) {
        if self.forms.len() >= MAX_FORM_DEPTH || self.forms.contains(&id) {
            warn!(depth = self.forms.len(), "Form XObject nesting too deep or recursive, skipping");
            return;
        }
        let pool = self.pool;
        let matrix = match pool.lookup(&stream.dict, b"Matrix") {
            Some(Object::Array(items)) => Matrix::from_operands(items).unwrap_or(Matrix::IDENTITY),
            _ => Matrix::IDENTITY,
        };
        let own_resources = pool
            .lookup(&stream.dict, b"Resources")
            .and_then(|r| pool.dict(r));
        let form_resources = own_resources.unwrap_or(resources);
        let content = objects::decode_stream(stream);

        let saved_state = self.state.clone();
        let saved_depth = self.stack.len();
        let saved_path = std::mem::take(&mut self.path);
        let saved_points = (self.current_point, self.subpath_start);
        let saved_text = (self.text_matrix, self.line_matrix);

        self.forms.push(id);
        self.state.ctm = matrix.then(&self.state.ctm);
        self.current_point = None;
        self.subpath_start = None;
        self.run(&content, form_resources);
        self.forms.pop();

        self.stack.truncate(saved_depth);
        self.state = saved_state;
        self.path = saved_path;
        (self.current_point, self.subpath_start) = saved_points;
        (self.text_matrix, self.line_matrix) = saved_text;
    }
}

fn gray(v: f32) -> Color {
    let v = v.clamp(0.0, 1.0);
    Color::rgb(v, v, v)
}

fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Color {
    let k = 1.0 - k.clamp(0.0, 1.0);
    Color::rgb(
        (1.0 - c.clamp(0.0, 1.0)) * k,
        (1.0 - m.clamp(0.0, 1.0)) * k,
        (1.0 - y.clamp(0.0, 1.0)) * k,
    )
}

fn color_from_components(values: &[f32]) -> Option<Color> {
    match values {
        [v] => Some(gray(*v)),
        [r, g, b] => Some(Color::rgb(*r, *g, *b).clamped()),
        [c, m, y, k] => Some(cmyk(*c, *m, *y, *k)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, Page, PageOrigin};
    use lopdf::dictionary;

    #[derive(Default)]
    struct Recorder {
        fills: Vec<(Vec<Subpath>, Paint)>,
        strokes: Vec<(Vec<Subpath>, f32)>,
        runs: Vec<TextRun>,
        images: usize,
    }

    impl ContentSink for Recorder {
        fn fill_path(&mut self, path: &[Subpath], _rule: FillRule, paint: Paint) {
            self.fills.push((path.to_vec(), paint));
        }
        fn stroke_path(&mut self, path: &[Subpath], width: f32, _paint: Paint) {
            self.strokes.push((path.to_vec(), width));
        }
        fn draw_image(&mut self, _image: &RgbaImage, _placement: &Matrix, _alpha: f32) {
            self.images += 1;
        }
        fn show_text(&mut self, run: &TextRun) {
            self.runs.push(run.clone());
        }
    }

    fn doc(content: &[u8], build_resources: impl FnOnce(&mut ResourcePool) -> Dictionary) -> Document {
        let mut pool = ResourcePool::new();
        let resources = build_resources(&mut pool);
        let res = pool.intern(Object::Dictionary(resources));
        let stream = pool.intern(Object::Stream(Stream::new(Dictionary::new(), content.to_vec())));
        let mut page = Page::new(
            [0.0, 0.0, 200.0, 100.0],
            PageOrigin {
                source: "t.pdf".into(),
                index: 0,
            },
        );
        page.set_resources(Some(res));
        page.push_source(stream);
        Document::from_parts(vec![page], Metadata::default(), pool)
    }

    fn helvetica(pool: &mut ResourcePool) -> Dictionary {
        let font = pool.intern(Object::Dictionary(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
        }));
        dictionary! { "Font" => dictionary! { "F1" => font.reference() } }
    }

    fn record(document: &Document, base: Matrix) -> Recorder {
        let mut recorder = Recorder::default();
        run_page(document, 0, base, &mut recorder, 1_000_000).unwrap();
        recorder
    }

    #[test]
    fn matrix_order_applies_left_operand_first() {
        let m = Matrix::scale(2.0, 2.0).then(&Matrix::translate(10.0, 0.0));
        assert_eq!(m.apply(1.0, 1.0), (12.0, 2.0));
        let inv = m.invert().unwrap();
        let (x, y) = inv.apply(12.0, 2.0);
        assert!((x - 1.0).abs() < 1e-5 && (y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rectangle_fill_in_output_space() {
        let d = doc(b"1 0 0 rg 10 20 30 40 re f", |_| Dictionary::new());
        let rec = record(&d, Matrix::scale(2.0, 2.0));
        assert_eq!(rec.fills.len(), 1);
        let (path, paint) = &rec.fills[0];
        assert_eq!(path[0].points, vec![(20.0, 40.0), (80.0, 40.0), (80.0, 120.0), (20.0, 120.0)]);
        assert!(path[0].closed);
        assert_eq!(paint.color, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn cm_composes_with_current_transform() {
        let d = doc(b"q 1 0 0 1 50 0 cm 2 0 0 2 0 0 cm 0 0 m 10 0 l S Q", |_| Dictionary::new());
        let rec = record(&d, Matrix::IDENTITY);
        let (path, width) = &rec.strokes[0];
        assert_eq!(path[0].points, vec![(50.0, 0.0), (70.0, 0.0)]);
        assert_eq!(*width, 2.0);
    }

    #[test]
    fn q_and_q_restore_colour() {
        let d = doc(b"q 0 0 1 rg Q 0 0 5 5 re f", |_| Dictionary::new());
        let rec = record(&d, Matrix::IDENTITY);
        assert_eq!(rec.fills[0].1.color, Color::BLACK);
    }

    #[test]
    fn ext_gstate_sets_fill_alpha() {
        let d = doc(b"/GS1 gs 0 0 5 5 re f", |pool| {
            let gs = pool.intern(Object::Dictionary(dictionary! { "ca" => Object::Real(0.25) }));
            dictionary! { "ExtGState" => dictionary! { "GS1" => gs.reference() } }
        });
        let rec = record(&d, Matrix::IDENTITY);
        assert_eq!(rec.fills[0].1.alpha, 0.25);
    }

    #[test]
    fn text_glyphs_advance_by_font_widths() {
        let d = doc(b"BT /F1 10 Tf 20 30 Td (Hi) Tj ET", helvetica);
        let rec = record(&d, Matrix::IDENTITY);
        let run = &rec.runs[0];
        let text: String = run.glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(text, "Hi");
        assert_eq!(run.glyphs[0].origin, (20.0, 30.0));
        // H is 722/1000 em
        assert!((run.glyphs[1].origin.0 - 27.22).abs() < 1e-3);
        assert!((run.font_size - 10.0).abs() < 1e-5);
    }

    #[test]
    fn tj_adjustments_move_the_pen() {
        let d = doc(b"BT /F1 10 Tf [(A) -1000 (B)] TJ ET", helvetica);
        let rec = record(&d, Matrix::IDENTITY);
        let b = &rec.runs[1].glyphs[0];
        // A is 667, then a 1000 unit gap
        assert!((b.origin.0 - 16.67).abs() < 1e-3);
    }

    #[test]
    fn recursive_forms_terminate() {
        let mut pool = ResourcePool::new();
        // No /Resources on the form, so /X1 resolves through the page again.
        let form = pool.intern(Object::Stream(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            b"/X1 Do 0 0 1 1 re f".to_vec(),
        )));
        let res = pool.intern(Object::Dictionary(dictionary! {
            "XObject" => dictionary! { "X1" => form.reference() },
        }));
        let content = pool.intern(Object::Stream(Stream::new(Dictionary::new(), b"/X1 Do".to_vec())));
        let mut page = Page::new(
            [0.0, 0.0, 10.0, 10.0],
            PageOrigin {
                source: "r.pdf".into(),
                index: 0,
            },
        );
        page.set_resources(Some(res));
        page.push_source(content);
        let d = Document::from_parts(vec![page], Metadata::default(), pool);
        let rec = record(&d, Matrix::IDENTITY);
        assert_eq!(rec.fills.len(), 1);
    }

    #[test]
    fn garbage_content_is_skipped() {
        let d = doc(b"\x00\x01\x02 not ( closed", |_| Dictionary::new());
        let rec = record(&d, Matrix::IDENTITY);
        assert!(rec.fills.is_empty());
    }
}
