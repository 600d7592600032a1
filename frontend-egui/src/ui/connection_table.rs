//! Socket tables for the TCP and UDP tabs.

use crate::ui::process_table::sort_header;
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use portwatch::{TcpConnection, UdpConnection};
use std::cmp::Ordering;
use std::net::Ipv4Addr;

/// One displayed socket, protocol-independent.
struct Row {
    name: String,
    pid: u32,
    state: &'static str,
    local: (Ipv4Addr, u16),
    remote: Option<(Ipv4Addr, u16)>,
}

impl From<&TcpConnection> for Row {
    fn from(c: &TcpConnection) -> Self {
        Self {
            name: c.name.clone(),
            pid: c.pid,
            state: c.state.label(),
            local: (c.local_ip, c.local_port),
            remote: Some((c.remote_ip, c.remote_port)),
        }
    }
}

impl From<&UdpConnection> for Row {
    fn from(c: &UdpConnection) -> Self {
        Self {
            name: c.name.clone(),
            pid: c.pid,
            state: "",
            local: (c.local_ip, c.local_port),
            remote: None,
        }
    }
}

fn matches(row: &Row, search_lower: &str) -> bool {
    search_lower.is_empty()
        || row.name.to_lowercase().contains(search_lower)
        || row.pid.to_string().contains(search_lower)
        || row.local.1.to_string().contains(search_lower)
}

fn endpoint((ip, port): (Ipv4Addr, u16)) -> String {
    format!("{ip}:{port}")
}

#[derive(Default, PartialEq, Eq, Clone, Copy)]
pub enum SortColumn {
    #[default]
    Local,
    Remote,
    State,
    Pid,
    Name,
}

#[derive(Default)]
pub struct ConnectionTable {
    pub sort_column: SortColumn,
    pub sort_descending: bool,
}

impl ConnectionTable {
    pub fn show_tcp(
        &mut self,
        ui: &mut egui::Ui,
        conns: &[TcpConnection],
        search: &str,
    ) -> usize {
        let rows = conns.iter().map(Row::from).collect();
        self.show(ui, rows, search, true)
    }

    pub fn show_udp(
        &mut self,
        ui: &mut egui::Ui,
        conns: &[UdpConnection],
        search: &str,
    ) -> usize {
        let rows = conns.iter().map(Row::from).collect();
        self.show(ui, rows, search, false)
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = match self.sort_column {
            SortColumn::Local => a.local.cmp(&b.local),
            SortColumn::Remote => a.remote.cmp(&b.remote),
            SortColumn::State => a.state.cmp(b.state),
            SortColumn::Pid => a.pid.cmp(&b.pid),
            SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        if self.sort_descending {
            ord.reverse()
        } else {
            ord
        }
    }

    fn show(&mut self, ui: &mut egui::Ui, rows: Vec<Row>, search: &str, tcp: bool) -> usize {
        let search_lower = search.to_lowercase();
        let mut rows: Vec<Row> = rows
            .into_iter()
            .filter(|r| matches(r, &search_lower))
            .collect();
        rows.sort_by(|a, b| self.compare(a, b));

        let text_sz = 16.0;
        let row_height = 30.0;

        let mut table_builder = TableBuilder::new(ui)
            .striped(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::exact(190.0)); // Local
        if tcp {
            table_builder = table_builder
                .column(Column::exact(190.0)) // Remote
                .column(Column::exact(120.0)); // State
        }
        table_builder = table_builder
            .column(Column::exact(80.0)) // PID
            .column(Column::remainder()); // Name

        let mut columns = vec![("Local", SortColumn::Local)];
        if tcp {
            columns.push(("Remote", SortColumn::Remote));
            columns.push(("State", SortColumn::State));
        }
        columns.push(("PID", SortColumn::Pid));
        columns.push(("Name", SortColumn::Name));

        table_builder
            .header(row_height, |mut header| {
                for (title, col) in &columns {
                    header.col(|ui| {
                        sort_header(
                            ui,
                            title,
                            *col,
                            &mut self.sort_column,
                            &mut self.sort_descending,
                        )
                    });
                }
            })
            .body(|body| {
                body.rows(row_height, rows.len(), |mut row| {
                    let r = &rows[row.index()];
                    let mut cells = vec![endpoint(r.local)];
                    if tcp {
                        cells.push(r.remote.map(endpoint).unwrap_or_default());
                        cells.push(r.state.to_string());
                    }
                    cells.push(r.pid.to_string());
                    cells.push(r.name.clone());

                    for text in cells {
                        row.col(|ui| {
                            ui.label(egui::RichText::new(text).size(text_sz).monospace());
                        });
                    }
                });
            });

        rows.len()
    }
}
