// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subcommand handlers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::Table;
use holo_device::{DeviceId, DeviceRecord};
use holo_quilt::{FormatId, LightfieldImage, ViewImage};
use holo_service_proto::ShowSource;

use crate::session::Session;
use crate::GlobalArgs;

pub(crate) fn formats(global: &GlobalArgs, all: bool) -> Result<()> {
    let session = Session::offline(global);
    let mut table = Table::new();
    let mut header = vec!["id", "description", "quilt", "grid", "view", "views"];
    if all {
        header.push("hidden");
    }
    table.set_header(header);
    for (id, f) in session.formats.list(all) {
        let mut row = vec![
            id.to_string(),
            f.description.clone(),
            format!("{}x{}", f.quilt_width, f.quilt_height),
            format!("{}x{}", f.columns, f.rows),
            format!("{}x{}", f.view_width, f.view_height),
            f.total_views.to_string(),
        ];
        if all {
            row.push(if f.hidden { "yes" } else { "no" }.to_owned());
        }
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}

pub(crate) fn info(global: &GlobalArgs, json: bool) -> Result<()> {
    let session = Session::online(global)?;
    let devices: Vec<&DeviceRecord> = session.devices.list(true).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("no displays found");
        return Ok(());
    }
    let active = session.devices.active_id();
    let mut table = Table::new();
    table.set_header(vec![
        "", "id", "serial", "type", "index", "state", "screen", "aspect", "quilt",
    ]);
    for d in devices {
        let state = match (d.emulated, d.connected) {
            (true, _) => "emulated",
            (false, true) => "connected",
            (false, false) => "lost",
        };
        let quilt = d.default_quilt.map_or_else(
            || "-".to_owned(),
            |q| format!("{}x{} {}x{}", q.quilt_x, q.quilt_y, q.tile_x, q.tile_y),
        );
        table.add_row(vec![
            if active == Some(d.id) { "*" } else { "" }.to_owned(),
            d.id.to_string(),
            d.serial.clone(),
            d.hardware_type.clone(),
            d.service_index.map_or_else(|| "-".to_owned(), |i| i.to_string()),
            state.to_owned(),
            format!(
                "{}x{}",
                d.calibration.screen_width, d.calibration.screen_height
            ),
            format!("{:.3}", d.aspect()),
            quilt,
        ]);
    }
    println!("{table}");
    Ok(())
}

pub(crate) fn show(
    global: &GlobalArgs,
    quilt: &Path,
    device: Option<DeviceId>,
    aspect: Option<f32>,
    invert: bool,
) -> Result<()> {
    let mut session = Session::offline(global);
    let mut lightfield = LightfieldImage::from_quilt_file(quilt, &session.formats)
        .with_context(|| format!("load quilt {}", quilt.display()))?;
    session.connect(global)?;
    let (devices, service) = session.parts()?;
    let target = devices.resolve(device)?.id;
    devices
        .display(Some(target), service, &mut lightfield, false, aspect, invert)
        .with_context(|| format!("show on device {target}"))?;
    println!(
        "showing {} ({}, {} views) on device {target}",
        quilt.display(),
        lightfield.format().description,
        lightfield.view_count()
    );
    Ok(())
}

pub(crate) fn show_source(
    global: &GlobalArgs,
    device: Option<DeviceId>,
    source: ShowSource,
) -> Result<()> {
    let mut session = Session::online(global)?;
    let (devices, service) = session.parts()?;
    let target = devices.resolve(device)?.id;
    devices
        .show_source(Some(target), service, source)
        .with_context(|| format!("show {} on device {target}", source.as_str()))?;
    println!("showing {} on device {target}", source.as_str());
    Ok(())
}

pub(crate) fn hide(global: &GlobalArgs, device: Option<DeviceId>) -> Result<()> {
    let mut session = Session::online(global)?;
    let (devices, service) = session.parts()?;
    let target = devices.resolve(device)?.id;
    devices
        .clear(Some(target), service)
        .with_context(|| format!("hide device {target}"))?;
    println!("device {target} cleared");
    Ok(())
}

pub(crate) fn unpack(global: &GlobalArgs, quilt: &Path, out_dir: &Path) -> Result<()> {
    let session = Session::offline(global);
    let lightfield = LightfieldImage::from_quilt_file(quilt, &session.formats)
        .with_context(|| format!("load quilt {}", quilt.display()))?;
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    for (index, view) in lightfield.views().iter().enumerate() {
        let path = view_path(out_dir, index);
        view.save(&path)
            .with_context(|| format!("write {}", path.display()))?;
    }
    println!(
        "{} views of {}x{} ({}) written to {}",
        lightfield.view_count(),
        lightfield.view_width(),
        lightfield.view_height(),
        lightfield.format().description,
        out_dir.display()
    );
    Ok(())
}

pub(crate) fn pack(
    global: &GlobalArgs,
    format: FormatId,
    out: &Path,
    views: &[PathBuf],
    flip: bool,
) -> Result<()> {
    let session = Session::offline(global);
    let mut lightfield = LightfieldImage::new(&session.formats, format)?;
    let images = views
        .iter()
        .map(|path| {
            ViewImage::load(path).with_context(|| format!("load view {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    lightfield.set_views(images)?;
    lightfield
        .quilt(flip)?
        .save(out)
        .with_context(|| format!("write {}", out.display()))?;
    println!(
        "{} views packed into {} ({}x{})",
        lightfield.view_count(),
        out.display(),
        lightfield.quilt_width(),
        lightfield.quilt_height()
    );
    Ok(())
}

/// `view_00.png`, `view_01.png`, ...
fn view_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("view_{index:02}.png"))
}
