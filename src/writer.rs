use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use brotli::enc::BrotliEncoderParams;
use brotli::CompressorWriter;
use serde::Serialize;

use crate::source::dump::{DumpNode, HierarchyDump, DUMP_VERSION};
use crate::traits::RecordId;

/// Writes hierarchy dumps in the JSON-Lines format read by [`crate::parse_dump`].
pub struct DumpWriter {
    writer: Box<dyn Write>,
    node_count: usize,
}

impl DumpWriter {
    /// Creates a writer for `file_path`.
    ///
    /// Brotli compression (quality 6) is enabled when the path ends in `.br`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hiersync::DumpWriter;
    /// # fn main() -> anyhow::Result<()> {
    /// let mut writer = DumpWriter::new("scene.hier.br")?;
    /// writer.write_header(serde_json::json!({"scene": "Main"}))?;
    /// writer.write_node(0, 1, "Main Camera", Some(&["Transform", "Camera"]))?;
    /// writer.write_footer()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self> {
        let path = file_path.as_ref();
        let file = File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;

        let writer: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "br") {
            let params = BrotliEncoderParams {
                quality: 6,
                lgwin: 22,
                ..Default::default()
            };
            Box::new(CompressorWriter::with_params(BufWriter::new(file), 4096, &params))
        } else {
            Box::new(BufWriter::new(file))
        };

        Ok(DumpWriter {
            writer,
            node_count: 0,
        })
    }

    pub fn write_header(&mut self, metadata: serde_json::Value) -> Result<()> {
        let header = serde_json::json!({
            "type": "header",
            "version": DUMP_VERSION,
            "metadata": metadata
        });
        self.write_line(&header)
    }

    pub fn write_node(
        &mut self,
        depth: usize,
        id: RecordId,
        name: &str,
        labels: Option<&[&str]>,
    ) -> Result<()> {
        let node = DumpNode {
            depth,
            id,
            name: name.to_string(),
            labels: labels.map(|l| l.iter().map(|s| s.to_string()).collect()),
        };
        self.write_dump_node(&node)
    }

    fn write_dump_node(&mut self, node: &DumpNode) -> Result<()> {
        let mut value = serde_json::to_value(node).context("Failed to serialize node")?;
        if let Some(map) = value.as_object_mut() {
            map.insert("type".to_string(), serde_json::Value::String("node".to_string()));
        }
        self.write_line(&value)?;
        self.node_count += 1;
        Ok(())
    }

    pub fn write_footer(&mut self) -> Result<()> {
        let footer = serde_json::json!({
            "type": "footer",
            "total_nodes": self.node_count
        });
        self.write_line(&footer)
    }

    /// Writes a whole dump: header, every node, footer.
    pub fn write_dump(&mut self, dump: &HierarchyDump) -> Result<()> {
        self.write_header(dump.header.metadata.clone())?;
        for node in &dump.nodes {
            self.write_dump_node(node)?;
        }
        self.write_footer()
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize to JSON")?;

        writeln!(self.writer, "{}", json).context("Failed to write line")?;

        self.writer.flush().context("Failed to flush writer")?;

        Ok(())
    }
}

impl Drop for DumpWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
