//! Snapshot and debug output.
//!
//! Snapshots are VTU (XML UnstructuredGrid) text files readable by ParaView
//! and VisIt. The DG field is discontinuous, so every element corner gets
//! its own VTK point; the mesh connectivity never merges points across
//! element boundaries. Matrix dumps are plain 1-based `row col value`
//! triplet files, loadable from MATLAB or Octave.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array1;
use solvers::CsrMatrix;

use crate::basis::LocalBasis;
use crate::error::SimulationError;
use crate::mesh::{Mesh, DOFS_PER_ELEMENT};

const SNAPSHOTS_DIR: &str = "snapshots";

/// VTK XML writer helper.
struct VtkWriter<W: Write> {
    writer: BufWriter<W>,
    indent: usize,
}

impl<W: Write> VtkWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            indent: 0,
        }
    }

    fn write_indent(&mut self) -> std::io::Result<()> {
        for _ in 0..self.indent {
            write!(self.writer, "  ")?;
        }
        Ok(())
    }

    fn write_header(&mut self) -> std::io::Result<()> {
        writeln!(self.writer, "<?xml version=\"1.0\"?>")?;
        writeln!(
            self.writer,
            "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        self.indent += 1;
        Ok(())
    }

    fn write_footer(&mut self) -> std::io::Result<()> {
        self.indent -= 1;
        writeln!(self.writer, "</VTKFile>")?;
        self.writer.flush()?;
        Ok(())
    }

    fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::io::Result<()> {
        self.write_indent()?;
        write!(self.writer, "<{}", name)?;
        for (key, value) in attrs {
            write!(self.writer, " {}=\"{}\"", key, value)?;
        }
        writeln!(self.writer, ">")?;
        self.indent += 1;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> std::io::Result<()> {
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</{}>", name)?;
        Ok(())
    }

    fn write_data_array_f64(&mut self, name: &str, data: &[f64]) -> std::io::Result<()> {
        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"Float64\" Name=\"{}\" format=\"ascii\">",
            name
        )?;

        self.indent += 1;
        self.write_indent()?;
        for (i, &v) in data.iter().enumerate() {
            write!(self.writer, "{:.10e}", v)?;
            if i < data.len() - 1 {
                write!(self.writer, " ")?;
            }
            // Line break every 6 values for readability
            if (i + 1) % 6 == 0 && i < data.len() - 1 {
                writeln!(self.writer)?;
                self.write_indent()?;
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;

        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")?;
        Ok(())
    }

    fn write_data_array_i32(&mut self, name: &str, data: &[i32]) -> std::io::Result<()> {
        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"Int32\" Name=\"{}\" format=\"ascii\">",
            name
        )?;

        self.indent += 1;
        self.write_indent()?;
        for (i, &v) in data.iter().enumerate() {
            write!(self.writer, "{}", v)?;
            if i < data.len() - 1 {
                write!(self.writer, " ")?;
            }
            if (i + 1) % 20 == 0 && i < data.len() - 1 {
                writeln!(self.writer)?;
                self.write_indent()?;
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;

        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")?;
        Ok(())
    }

    fn write_data_array_u8(&mut self, name: &str, data: &[u8]) -> std::io::Result<()> {
        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"UInt8\" Name=\"{}\" format=\"ascii\">",
            name
        )?;

        self.indent += 1;
        self.write_indent()?;
        for (i, &v) in data.iter().enumerate() {
            write!(self.writer, "{}", v)?;
            if i < data.len() - 1 {
                write!(self.writer, " ")?;
            }
            if (i + 1) % 20 == 0 && i < data.len() - 1 {
                writeln!(self.writer)?;
                self.write_indent()?;
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;

        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")?;
        Ok(())
    }

    fn write_points(&mut self, points: &[(f64, f64)]) -> std::io::Result<()> {
        self.start_element("Points", &[])?;

        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"Float64\" NumberOfComponents=\"3\" format=\"ascii\">"
        )?;

        self.indent += 1;
        self.write_indent()?;
        for (i, &(x, y)) in points.iter().enumerate() {
            write!(self.writer, "{:.10e} {:.10e} 0.0", x, y)?;
            if i < points.len() - 1 {
                write!(self.writer, " ")?;
            }
            if (i + 1) % 2 == 0 && i < points.len() - 1 {
                writeln!(self.writer)?;
                self.write_indent()?;
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;

        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")?;

        self.end_element("Points")?;
        Ok(())
    }

    fn write_cells(&mut self, num_cells: usize) -> std::io::Result<()> {
        self.start_element("Cells", &[])?;

        // One VTK_QUAD per DG element; its corners are the element's own
        // four points, in DOF order.
        let connectivity: Vec<i32> = (0..num_cells * DOFS_PER_ELEMENT)
            .map(|i| i as i32)
            .collect();
        self.write_data_array_i32("connectivity", &connectivity)?;

        let offsets: Vec<i32> = (1..=num_cells)
            .map(|i| (i * DOFS_PER_ELEMENT) as i32)
            .collect();
        self.write_data_array_i32("offsets", &offsets)?;

        // VTK_QUAD = 9
        let types: Vec<u8> = vec![9; num_cells];
        self.write_data_array_u8("types", &types)?;

        self.end_element("Cells")?;
        Ok(())
    }

    fn write_time_metadata(&mut self, time: f64, cycle: usize) -> std::io::Result<()> {
        self.start_element("FieldData", &[])?;

        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"Float64\" Name=\"TIME\" NumberOfTuples=\"1\" format=\"ascii\">"
        )?;
        self.indent += 1;
        self.write_indent()?;
        writeln!(self.writer, "{:.10e}", time)?;
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")?;

        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"Int32\" Name=\"CYCLE\" NumberOfTuples=\"1\" format=\"ascii\">"
        )?;
        self.indent += 1;
        self.write_indent()?;
        writeln!(self.writer, "{}", cycle)?;
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")?;

        self.end_element("FieldData")?;
        Ok(())
    }
}

/// Writes pressure snapshots for one mesh into `<output_dir>/snapshots/`.
pub struct SnapshotWriter<'a> {
    mesh: &'a Mesh,
    directory: PathBuf,
    prefix: String,
}

impl<'a> SnapshotWriter<'a> {
    /// Prepare the snapshot directory. Creation failure is fatal since
    /// snapshots are a required output of a run.
    pub fn new(
        mesh: &'a Mesh,
        output_dir: &Path,
        extra: &str,
    ) -> Result<SnapshotWriter<'a>, SimulationError> {
        let directory = output_dir.join(SNAPSHOTS_DIR);
        fs::create_dir_all(&directory)?;
        Ok(SnapshotWriter {
            mesh,
            directory,
            prefix: format!("GMsFEM_{}", extra),
        })
    }

    /// Write one snapshot of the fine-scale pressure, keyed by cycle.
    ///
    /// Point data is the DG field itself; cell data is its per-element
    /// average. Returns the path of the written file.
    pub fn write(
        &self,
        cycle: usize,
        time: f64,
        fine_pressure: &Array1<f64>,
    ) -> Result<PathBuf, SimulationError> {
        if fine_pressure.len() != self.mesh.num_dofs() {
            return Err(SimulationError::DimensionMismatch {
                expected: self.mesh.num_dofs(),
                actual: fine_pressure.len(),
            });
        }

        let n_elements = self.mesh.num_elements();
        let mut points = Vec::with_capacity(n_elements * DOFS_PER_ELEMENT);
        let mut cell_averages = Vec::with_capacity(n_elements);
        for e in 0..n_elements {
            let coords = self.mesh.element_coords(e);
            let mut sum = 0.0;
            for k in 0..DOFS_PER_ELEMENT {
                points.push((coords[k].x, coords[k].y));
                sum += fine_pressure[Mesh::dof(e, k)];
            }
            cell_averages.push(sum / DOFS_PER_ELEMENT as f64);
        }

        let path = self.directory.join(format!("{}{:06}.vtu", self.prefix, cycle));
        let file = File::create(&path)?;
        let mut writer = VtkWriter::new(file);

        writer.write_header()?;
        writer.start_element("UnstructuredGrid", &[])?;
        writer.start_element(
            "Piece",
            &[
                ("NumberOfPoints", &points.len().to_string()),
                ("NumberOfCells", &n_elements.to_string()),
            ],
        )?;

        writer.write_points(&points)?;
        writer.write_cells(n_elements)?;

        writer.start_element("PointData", &[("Scalars", "fine_pressure")])?;
        let point_data = fine_pressure.as_slice().expect("Array should be contiguous");
        writer.write_data_array_f64("fine_pressure", point_data)?;
        writer.end_element("PointData")?;

        writer.start_element("CellData", &[("Scalars", "coarse_pressure")])?;
        writer.write_data_array_f64("coarse_pressure", &cell_averages)?;
        writer.end_element("CellData")?;

        writer.end_element("Piece")?;
        writer.write_time_metadata(time, cycle)?;
        writer.end_element("UnstructuredGrid")?;
        writer.write_footer()?;

        Ok(path)
    }
}

fn write_sparse_triplets(path: &Path, matrix: &CsrMatrix<f64>) -> Result<(), SimulationError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for row in 0..matrix.num_rows {
        for (col, value) in matrix.row_entries(row) {
            writeln!(writer, "{} {} {:.15e}", row + 1, col + 1, value)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_local_basis(path: &Path, basis: &LocalBasis) -> Result<(), SimulationError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    // Local DOFs as rows, modes as columns.
    for dof in 0..basis.num_local_dofs() {
        for mode in 0..basis.num_basis() {
            writeln!(
                writer,
                "{} {} {:.15e}",
                dof + 1,
                mode + 1,
                basis.vectors[[mode, dof]]
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Dump every operator of the pipeline as triplet files in `output_dir`.
/// Enabled by the `print_matrices` debug flag.
pub fn dump_matrices(
    output_dir: &Path,
    bases: &[LocalBasis],
    restriction: &CsrMatrix<f64>,
    mass_fine: &CsrMatrix<f64>,
    stiffness_fine: &CsrMatrix<f64>,
    mass_coarse: &CsrMatrix<f64>,
    stiffness_coarse: &CsrMatrix<f64>,
) -> Result<(), SimulationError> {
    fs::create_dir_all(output_dir)?;

    for basis in bases {
        let name = format!("r{}_local_mat.dat", basis.block);
        write_local_basis(&output_dir.join(name), basis)?;
    }

    write_sparse_triplets(&output_dir.join("r_global_mat.dat"), restriction)?;
    write_sparse_triplets(
        &output_dir.join("r_global_mat_t.dat"),
        &restriction.transpose(),
    )?;
    write_sparse_triplets(&output_dir.join("m_fine_mat.dat"), mass_fine)?;
    write_sparse_triplets(&output_dir.join("s_fine_mat.dat"), stiffness_fine)?;
    write_sparse_triplets(&output_dir.join("m_coarse_mat.dat"), mass_coarse)?;
    write_sparse_triplets(&output_dir.join("s_coarse_mat.dat"), stiffness_coarse)?;

    log::info!("matrix dumps written to {}", output_dir.display());
    Ok(())
}
