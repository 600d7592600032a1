//! Process table component with sorting and terminate functionality.

use eframe::egui;
use egui_extras::{Column, TableBuilder};
use portwatch::{platform, Config, Inspector, ProcessInfo};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// Filter processes based on search text
fn filter_processes<'a>(
    processes: &'a [ProcessInfo],
    search_text: &str,
) -> Vec<&'a ProcessInfo> {
    let search_lower = search_text.to_lowercase();
    processes
        .iter()
        .filter(|p| {
            search_lower.is_empty()
                || p.name.to_lowercase().contains(&search_lower)
                || p.pid.to_string().contains(&search_lower)
        })
        .collect()
}

#[derive(Default, PartialEq, Eq, Clone, Copy)]
pub enum SortColumn {
    #[default]
    Pid,
    Name,
}

pub struct ProcessTable {
    pub sort_column: SortColumn,
    pub sort_descending: bool,
    pub terminating: Arc<Mutex<HashSet<u32>>>,
    config: Arc<Config>,
}

impl ProcessTable {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            sort_column: SortColumn::Pid,
            sort_descending: false,
            terminating: Arc::new(Mutex::new(HashSet::new())),
            config,
        }
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        processes: &[ProcessInfo],
        search_text: &str,
    ) -> usize {
        let mut sorted_processes = filter_processes(processes, search_text);
        sorted_processes.sort_by(|a, b| {
            let ord = match self.sort_column {
                SortColumn::Pid => a.pid.cmp(&b.pid),
                SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            };
            if self.sort_descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let text_sz = 16.0;
        let row_height = 30.0;

        TableBuilder::new(ui)
            .striped(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::exact(100.0)) // PID
            .column(Column::remainder()) // Name
            .header(row_height, |mut header| {
                header.col(|ui| {
                    sort_header(
                        ui,
                        "PID",
                        SortColumn::Pid,
                        &mut self.sort_column,
                        &mut self.sort_descending,
                    )
                });
                header.col(|ui| {
                    sort_header(
                        ui,
                        "Name",
                        SortColumn::Name,
                        &mut self.sort_column,
                        &mut self.sort_descending,
                    )
                });
            })
            .body(|body| {
                body.rows(row_height, sorted_processes.len(), |mut row| {
                    let p = sorted_processes[row.index()];

                    row.col(|ui| {
                        ui.label(
                            egui::RichText::new(p.pid.to_string())
                                .size(text_sz)
                                .monospace(),
                        );
                    });

                    row.col(|ui| {
                        let response = ui.add(
                            egui::Label::new(egui::RichText::new(&p.name).size(text_sz))
                                .sense(egui::Sense::click()),
                        );
                        response.clone().on_hover_text(format!(
                            "{}\nPID: {}\nRight-click for options",
                            p.name, p.pid
                        ));
                        response.context_menu(|ui| {
                            self.show_context_menu(ui, p);
                        });
                    });
                });
            });

        sorted_processes.len()
    }

    fn show_context_menu(&mut self, ui: &mut egui::Ui, p: &ProcessInfo) {
        ui.set_min_width(200.0);

        let is_terminating = self
            .terminating
            .lock()
            .map(|set| set.contains(&p.pid))
            .unwrap_or(false);
        let text = if is_terminating {
            "Terminating..."
        } else {
            "Terminate"
        };
        let button = ui.add_enabled(
            !is_terminating,
            egui::Button::new(text)
                .fill(egui::Color32::from_rgb(200, 40, 40))
                .min_size(egui::vec2(180.0, 25.0)),
        );

        if button.clicked() {
            if let Ok(mut set) = self.terminating.lock() {
                set.insert(p.pid);
            }
            let pid = p.pid;
            let terminating = self.terminating.clone();
            let config = self.config.clone();

            // The wait has no timeout, so it must not run on the UI thread
            tokio::task::spawn_blocking(move || {
                let inspector = Inspector::new(platform::system(), &config);
                match inspector.terminate(pid) {
                    Ok(status) => info!(pid, ?status, "terminate finished"),
                    Err(e) => warn!(pid, error = %e, "terminate failed"),
                }
                if let Ok(mut set) = terminating.lock() {
                    set.remove(&pid);
                }
            });

            ui.close_menu();
        }

        ui.separator();
        ui.label(format!("PID: {}", p.pid));
        ui.label(format!("Name: {}", p.name));
    }
}

pub fn sort_header<C: PartialEq + Copy>(
    ui: &mut egui::Ui,
    title: &str,
    col: C,
    sort_col: &mut C,
    descending: &mut bool,
) {
    let active = *sort_col == col;
    let arrow = if !active {
        ""
    } else if *descending {
        " ↓"
    } else {
        " ↑"
    };
    let btn = egui::Button::new(
        egui::RichText::new(format!("{title}{arrow}"))
            .strong()
            .size(15.0),
    )
    .frame(false);

    if ui.add(btn).clicked() {
        if active {
            *descending = !*descending;
        } else {
            *sort_col = col;
            *descending = false;
        }
    }
}
