use crate::config::{Config, RenderConfig};
use crate::scene::{Scene, SceneEdge};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const CHAR_WIDTH_RATIO: f32 = 0.6;

pub fn render_svg(scene: &Scene, config: &Config) -> String {
    let theme = &config.theme;
    let padding = config.render.padding;
    let min_x = scene.bounds.min_x - padding;
    let min_y = scene.bounds.min_y - padding;
    let width = (scene.bounds.width() + padding * 2.0).max(200.0);
    let height = (scene.bounds.height() + padding * 2.0).max(200.0);
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{min_x:.2} {min_y:.2} {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect x=\"{min_x:.2}\" y=\"{min_y:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.render.background
    ));

    // One arrow marker per edge colour.
    let mut markers: Vec<&str> = Vec::new();
    for edge in &scene.edges {
        if !markers.contains(&edge.color.as_str()) {
            markers.push(edge.color.as_str());
        }
    }
    svg.push_str("<defs>");
    for (idx, color) in markers.iter().enumerate() {
        svg.push_str(&format!(
            "<marker id=\"arrow-{idx}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
            escape_xml(color)
        ));
    }
    svg.push_str("</defs>");

    for container in &scene.containers {
        svg.push_str(&format!(
            "<g class=\"event-group\" data-id=\"{}\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"10\" ry=\"10\" fill=\"{}\" stroke=\"{}\" stroke-dasharray=\"6 4\" stroke-width=\"1.2\"/>",
            escape_xml(&container.id),
            container.x,
            container.y,
            container.width,
            container.height,
            theme.cluster_background,
            theme.cluster_border
        ));
        let label_x = container.x + 12.0;
        let label_y = container.y + 20.0;
        svg.push_str(&format!(
            "<text x=\"{label_x:.2}\" y=\"{label_y:.2}\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}</text></g>",
            escape_xml(&theme.font_family),
            theme.font_size,
            theme.cluster_text_color,
            escape_xml(&container.title)
        ));
    }

    let label_positions = compute_edge_label_positions(&scene.edges, theme);

    for (idx, edge) in scene.edges.iter().enumerate() {
        let d = points_to_path(&edge.points);
        let marker = markers
            .iter()
            .position(|color| *color == edge.color)
            .unwrap_or_default();
        svg.push_str(&format!(
            "<path class=\"edge\" data-id=\"{}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\" marker-end=\"url(#arrow-{marker})\"/>",
            escape_xml(&edge.id),
            d,
            escape_xml(&edge.color)
        ));

        if let Some((x, y, w, h)) = label_positions.get(&idx).copied() {
            svg.push_str(&format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"0.8\"/>",
                x - w / 2.0,
                y - h / 2.0,
                theme.edge_label_background,
                escape_xml(&edge.color)
            ));
            svg.push_str(&format!(
                "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}</text>",
                y + theme.font_size * 0.35,
                escape_xml(&theme.font_family),
                theme.font_size,
                escape_xml(&edge.color),
                escape_xml(&edge.label)
            ));
        }
    }

    for node in &scene.nodes {
        svg.push_str(&format!("<g class=\"node\" data-id=\"{}\">", escape_xml(&node.id)));
        if let Some(title) = &node.title {
            svg.push_str(&format!("<title>{}</title>", escape_xml(title)));
        }
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\"/>",
            node.x,
            node.y,
            node.width,
            node.height,
            node.fill,
            theme.node_border_color
        ));
        let center_x = node.x + node.width / 2.0;
        let center_y = node.y + node.height / 2.0;
        svg.push_str(&text_block_svg(center_x, center_y, &node.lines, theme, config.layout.label_line_height));
        svg.push_str("</g>");
    }

    svg.push_str("</svg>");
    svg
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    let Some((first, rest)) = points.split_first() else {
        return String::new();
    };
    let mut d = format!("M {:.2} {:.2}", first.0, first.1);
    for point in rest {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

fn text_block_svg(x: f32, y: f32, lines: &[String], theme: &Theme, line_height: f32) -> String {
    let step = theme.font_size * line_height;
    let total_height = lines.len() as f32 * step;
    let start_y = y - total_height / 2.0 + theme.font_size;
    let mut text = format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">",
        escape_xml(&theme.font_family),
        theme.font_size,
        theme.node_text_color
    );
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { step };
        text.push_str(&format!("<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>", escape_xml(line)));
    }
    text.push_str("</text>");
    text
}

/// Label box centre and size per edge index, nudged down until it clears
/// the labels already placed.
fn compute_edge_label_positions(edges: &[SceneEdge], theme: &Theme) -> HashMap<usize, (f32, f32, f32, f32)> {
    let mut occupied: Vec<(f32, f32, f32, f32)> = Vec::new();
    let mut positions = HashMap::new();

    for (idx, edge) in edges.iter().enumerate() {
        if edge.label.trim().is_empty() {
            continue;
        }
        let w = edge.label.chars().count() as f32 * theme.font_size * CHAR_WIDTH_RATIO + 12.0;
        let h = theme.font_size + 8.0;
        let (mid_x, mid_y) = edge_midpoint(edge);
        let mut offset = 0.0;
        let mut placed = (mid_x, mid_y);

        for _ in 0..6 {
            let y = mid_y + offset;
            let rect = (mid_x - w / 2.0, y - h / 2.0, w, h);
            if !collides(&rect, &occupied) {
                occupied.push(rect);
                placed = (mid_x, y);
                break;
            }
            offset += h + 6.0;
        }

        positions.insert(idx, (placed.0, placed.1, w, h));
    }

    positions
}

fn edge_midpoint(edge: &SceneEdge) -> (f32, f32) {
    let points = &edge.points;
    if points.len() >= 4 {
        let p1 = points[1];
        let p2 = points[2];
        ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0)
    } else if let (Some(p1), Some(p2)) = (points.first(), points.last()) {
        ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0)
    } else {
        (0.0, 0.0)
    }
}

fn collides(rect: &(f32, f32, f32, f32), occupied: &[(f32, f32, f32, f32)]) -> bool {
    occupied.iter().any(|(x, y, w, h)| {
        rect.0 < x + w && rect.0 + rect.2 > *x && rect.1 < y + h && rect.1 + rect.3 > *y
    })
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("invalid canvas size {}x{}", render_cfg.width, render_cfg.height))?;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
