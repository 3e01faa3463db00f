//! HTML Pages
//!
//! Server-rendered pages for the overview and the grouped view. Every
//! piece of report text goes through [`escape_html`].

use std::fmt::Write;

use super::grouping::GroupedView;
use crate::domain::record::StorageUnitRecord;
use crate::report::ParsedReport;
use crate::report::writer::{self, GENERATED_FORMAT};

const STYLE: &str = "\
body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin:1em 0}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
th{background:#f0f0f0}\
pre{background:#f7f7f7;padding:1em;overflow-x:auto}\
.SSD{color:#1565c0}.HDD{color:#6d4c41}.Unknown{color:#999}\
nav a{margin-right:1em}";

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body>\
         <nav><a href=\"/\">Overview</a><a href=\"/osds-by-server\">OSDs by server</a></nav>\
         <h1>{title}</h1>{body}</body></html>\n",
        title = escape_html(title),
    )
}

fn unit_table(out: &mut String, units: &[&StorageUnitRecord], crush: impl Fn(&str) -> Option<String>) {
    out.push_str(
        "<table><tr><th>OSD ID</th><th>Block Device</th><th>Device Path</th><th>Type</th>\
         <th>CRUSH Class</th><th>Size</th><th>Model</th><th>DB Device</th><th>DB Size</th>\
         <th>WAL Device</th><th>WAL Size</th></tr>",
    );
    for unit in units {
        let class = unit.device_class.to_string();
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&unit.unit_id),
            escape_html(&unit.block_volume),
            escape_html(&unit.block_device_path),
            class,
            class,
            escape_html(&crush(&unit.unit_id).unwrap_or_else(|| "-".to_string())),
            escape_html(&unit.size),
            escape_html(&unit.model),
            escape_html(&unit.metadata_device_path),
            escape_html(&unit.metadata_device_size),
            escape_html(&unit.log_device_path),
            escape_html(&unit.log_device_size),
        );
    }
    out.push_str("</table>");
}

fn preformatted(out: &mut String, title: &str, content: &str) {
    let _ = write!(
        out,
        "<details><summary>{}</summary><pre>{}</pre></details>",
        escape_html(title),
        escape_html(content)
    );
}

/// Overview of every node
pub fn render_overview(reports: &[ParsedReport]) -> String {
    let mut body = String::new();

    if reports.is_empty() {
        body.push_str("<p>No reports found. Run <code>cephscope fetch</code> first.</p>");
    }

    for parsed in reports {
        let report = &parsed.report;
        let _ = write!(
            body,
            "<h2 id=\"{id}\">{node}</h2><p>Generated: {generated} &middot; \
             Local OSDs: {local} &middot; <a href=\"/api/server/{link}\">JSON</a></p>",
            id = escape_html(&report.node),
            node = escape_html(&report.node),
            generated = report.generated_at.format(GENERATED_FORMAT),
            local = escape_html(&report.local_units.join(", ")),
            link = urlencoding::encode(&report.node),
        );

        let units: Vec<&StorageUnitRecord> = report.units.iter().collect();
        unit_table(&mut body, &units, |id| parsed.crush_classes.get(id).cloned());

        if !report.pools.is_empty() {
            body.push_str(
                "<table><tr><th>Pool</th><th>Size</th><th>Used</th><th>Available</th><th>% Used</th></tr>",
            );
            for pool in &report.pools {
                let _ = write!(
                    body,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&pool.name),
                    escape_html(&pool.size),
                    escape_html(&pool.used),
                    escape_html(&pool.available),
                    escape_html(&pool.percent_used),
                );
            }
            body.push_str("</table>");
        }

        let blocks = &report.blocks;
        for (title, content) in [
            (writer::CLUSTER_STATUS, &blocks.status),
            (writer::CEPH_VERSION, &blocks.version),
            (writer::CLUSTER_HEALTH, &blocks.health),
            (writer::OSD_TREE, &blocks.osd_tree),
            (writer::OSD_UTILIZATION, &blocks.osd_utilization),
            (writer::PG_STATUS, &blocks.pg_status),
            (writer::BLOCK_DEVICES, &blocks.block_devices),
            (writer::LVM_PVS, &blocks.physical_volumes),
            (writer::LVM_VGS, &blocks.volume_groups),
            (writer::LVM_LVS, &blocks.logical_volumes),
            (writer::CRUSH_RULES, &blocks.crush_rules),
        ] {
            preformatted(&mut body, title, content);
        }
    }

    page("Ceph Cluster Overview", &body)
}

/// Grouped view with filter form
pub fn render_grouped(view: &GroupedView) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        "<form method=\"get\" action=\"/osds-by-server\">\
         <input type=\"text\" name=\"filter\" value=\"{}\" placeholder=\"Filter (e.g. ssd, sdb, node name)\">\
         <button type=\"submit\">Filter</button> <a href=\"/osds-by-server\">Clear</a></form>",
        escape_html(view.filter.as_deref().unwrap_or(""))
    );

    if view.nodes.is_empty() {
        match view.filter {
            Some(_) => body.push_str("<p>No OSDs match.</p>"),
            None => body.push_str("<p>No reports found. Run <code>cephscope fetch</code> first.</p>"),
        }
    }

    for node in &view.nodes {
        let _ = write!(
            body,
            "<h2>{}</h2><p>{} OSD(s)</p>",
            escape_html(&node.node),
            node.unit_count()
        );
        for group in &node.classes {
            let _ = write!(
                body,
                "<h3 class=\"{class}\">{class} ({count})</h3>",
                class = group.class,
                count = group.units.len()
            );
            if group.units.is_empty() {
                body.push_str("<p>None</p>");
                continue;
            }
            let units: Vec<&StorageUnitRecord> = group.units.iter().map(|u| &u.record).collect();
            unit_table(&mut body, &units, |id| {
                group
                    .units
                    .iter()
                    .find(|u| u.record.unit_id == id)
                    .and_then(|u| u.crush_class.clone())
            });
        }
    }

    page("OSDs by Server", &body)
}
