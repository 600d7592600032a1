//! Status bar showing table counts and the last refresh failure.

use crate::ui::header::Tab;
use eframe::egui;
use portwatch::Snapshot;

pub struct StatusBar;

impl StatusBar {
    pub fn show(ui: &mut egui::Ui, snapshot: &Snapshot, tab: Tab, shown: usize) {
        let total = match tab {
            Tab::Processes => snapshot.processes.len(),
            Tab::Tcp => snapshot.tcp.len(),
            Tab::Udp => snapshot.udp.len(),
        };

        ui.separator();
        ui.horizontal(|ui| {
            ui.label(format!("Processes: {}", snapshot.processes.len()));
            ui.separator();
            ui.label(format!("TCP: {}", snapshot.tcp.len()));
            ui.separator();
            ui.label(format!("UDP: {}", snapshot.udp.len()));

            if shown != total {
                ui.separator();
                ui.label(format!("Filtered: {shown}"));
            }

            if let Some(e) = snapshot.errors.last() {
                ui.separator();
                let failed = snapshot.errors.len();
                ui.colored_label(egui::Color32::from_rgb(230, 80, 80), e.to_string())
                    .on_hover_text(format!("{failed} table(s) failed to refresh"));
            }
        });
    }
}
