use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3::IntoPyObject;
use rand::{rngs::StdRng, SeedableRng};

use crate::core::{
    ChargeHistoryGenerator, Event, EventKind, GeneratorConfig, Histories, History, InitialCharge,
    MfpTable,
};
use crate::error::Error;

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Read a `{"a->b": mfp}` dict, keeping its insertion order.
fn table_from_dict(mfp: &Bound<'_, PyDict>) -> PyResult<MfpTable> {
    let mut entries = Vec::with_capacity(mfp.len());
    for (key, value) in mfp.iter() {
        entries.push((key.extract::<String>()?, value.extract::<f64>()?));
    }
    MfpTable::from_labeled(entries).map_err(py_err)
}

fn initial_from_py(initial_q: &Bound<'_, PyAny>) -> PyResult<InitialCharge> {
    if let Ok(q) = initial_q.extract::<i32>() {
        return Ok(InitialCharge::Uniform(q));
    }
    let qs: Vec<i32> = initial_q
        .extract()
        .map_err(|_| py_err("initial_q must be an int or a sequence of ints"))?;
    Ok(InitialCharge::PerParticle(qs))
}

fn rng_from_seed(seed: Option<u64>) -> PyResult<StdRng> {
    let seed = seed.ok_or_else(|| {
        py_err(Error::Configuration(
            "a seed is required for reproducible histories".into(),
        ))
    })?;
    Ok(StdRng::seed_from_u64(seed))
}

/// Parse `[q, length, kind]` or `[q, length, kind, zp]` entries.
fn event_from_py(item: &Bound<'_, PyAny>) -> PyResult<Event> {
    let fields: Vec<Bound<'_, PyAny>> = item.extract()?;
    if fields.len() != 3 && fields.len() != 4 {
        return Err(py_err(format!(
            "history events must have 3 or 4 fields, got {}",
            fields.len()
        )));
    }
    let kind: EventKind = fields[2].extract::<String>()?.parse().map_err(py_err)?;
    let event = Event::new(fields[0].extract()?, fields[1].extract()?, kind).map_err(py_err)?;
    match fields.get(3) {
        Some(zp) => Ok(event.with_zp(zp.extract()?)),
        None => Ok(event),
    }
}

/// Inner lists of `histories` plus, for each, a one-event history holding its
/// last event. Only the tails are converted; earlier events are never read.
fn tails_from_py<'py>(
    histories: &Bound<'py, PyList>,
) -> PyResult<(Vec<Bound<'py, PyList>>, Histories)> {
    let mut lists = Vec::with_capacity(histories.len());
    let mut tails = Vec::with_capacity(histories.len());
    for item in histories.iter() {
        let list = item
            .downcast_into::<PyList>()
            .map_err(|_| py_err("each history must be a list"))?;
        let tail: History = match list.len() {
            0 => Vec::new(),
            len => vec![event_from_py(&list.get_item(len - 1)?)?],
        };
        lists.push(list);
        tails.push(tail);
    }
    Ok((lists, tails))
}

fn event_to_py(py: Python<'_>, e: &Event) -> PyResult<Py<PyAny>> {
    let kind = e.kind.as_str();
    let obj = match e.zp {
        Some(zp) => (e.charge, e.length, kind, zp)
            .into_pyobject(py)?
            .into_any()
            .unbind(),
        None => (e.charge, e.length, kind).into_pyobject(py)?.into_any().unbind(),
    };
    Ok(obj)
}

fn histories_to_py(py: Python<'_>, histories: &Histories) -> PyResult<Vec<Vec<Py<PyAny>>>> {
    histories
        .iter()
        .map(|h| h.iter().map(|e| event_to_py(py, e)).collect())
        .collect()
}

/// Sample charge histories from a dict of mean free paths.
///
/// Parameters
/// - mfp: dict mapping "a->b" (adjacent charges) to a positive mean free path
/// - initial_q: starting charge (int) or one charge per particle (sequence)
/// - length: distance to simulate, in the MFP unit; added to the last recorded
///   length when `histories` is given
/// - n: number of particles
/// - seed: RNG seed (int); required
/// - histories: list of `n` lists from a previous call to resume; the new
///   events are appended to those lists in place
/// - ignored: simulate the extension but do not advance the recorded length
///
/// Returns a list of `n` lists of `(q, length, kind[, zp])` tuples: the
/// `histories` object itself when one was given, otherwise a new list. On
/// error nothing is appended.
#[pyfunction]
#[pyo3(signature = (mfp, initial_q, length, n=10000, seed=None, histories=None, ignored=false))]
#[allow(clippy::too_many_arguments)]
fn get_charge_histories<'py>(
    py: Python<'py>,
    mfp: &Bound<'py, PyDict>,
    initial_q: &Bound<'py, PyAny>,
    length: f64,
    n: usize,
    seed: Option<u64>,
    histories: Option<Bound<'py, PyList>>,
    ignored: bool,
) -> PyResult<Py<PyAny>> {
    let mut rng = rng_from_seed(seed)?;
    let generator = ChargeHistoryGenerator::new(table_from_dict(mfp)?);
    let initial = initial_from_py(initial_q)?;

    let Some(histories) = histories else {
        let out = py
            .detach(|| generator.generate(&initial, length, n, &mut rng, None, ignored))
            .map_err(py_err)?;
        return Ok(histories_to_py(py, &out)?.into_pyobject(py)?.into_any().unbind());
    };

    let (lists, tails) = tails_from_py(&histories)?;
    let tail_lens: Vec<usize> = tails.iter().map(Vec::len).collect();
    let out = py
        .detach(|| generator.generate(&initial, length, n, &mut rng, Some(tails), ignored))
        .map_err(py_err)?;
    for ((list, extended), skip) in lists.iter().zip(&out).zip(tail_lens) {
        for e in &extended[skip..] {
            list.append(event_to_py(py, e)?)?;
        }
    }
    Ok(histories.into_any().unbind())
}

/// Stateful wrapper that keeps histories and the RNG on the Rust side between calls.
///
/// API:
/// - __new__(mfp, seed, max_steps=None)
/// - run(initial_q, length, n=10000, ignored=False)
/// - extend(length, ignored=False)
/// - get_histories() -> list[list[tuple]]
/// - get_final_charges() -> list[int]
#[pyclass]
pub struct ChargeWalk {
    generator: ChargeHistoryGenerator,
    rng: StdRng,
    histories: Option<Histories>,
}

#[pymethods]
impl ChargeWalk {
    /// Errors: raises ValueError on an invalid table, a missing seed or `max_steps=0`.
    #[new]
    #[pyo3(signature = (mfp, seed=None, max_steps=None))]
    fn new(mfp: &Bound<'_, PyDict>, seed: Option<u64>, max_steps: Option<u64>) -> PyResult<Self> {
        let rng = rng_from_seed(seed)?;
        let config = GeneratorConfig { max_steps };
        let generator =
            ChargeHistoryGenerator::with_config(table_from_dict(mfp)?, config).map_err(py_err)?;
        Ok(Self {
            generator,
            rng,
            histories: None,
        })
    }

    /// Start fresh histories, discarding any stored ones (releases the GIL).
    #[pyo3(signature = (initial_q, length, n=10000, ignored=false))]
    fn run(
        &mut self,
        py: Python<'_>,
        initial_q: &Bound<'_, PyAny>,
        length: f64,
        n: usize,
        ignored: bool,
    ) -> PyResult<()> {
        let initial = initial_from_py(initial_q)?;
        let Self { generator, rng, .. } = self;
        let out = py
            .detach(|| generator.generate(&initial, length, n, rng, None, ignored))
            .map_err(py_err)?;
        self.histories = Some(out);
        Ok(())
    }

    /// Resume the stored histories by `length` (releases the GIL).
    #[pyo3(signature = (length, ignored=false))]
    fn extend(&mut self, py: Python<'_>, length: f64, ignored: bool) -> PyResult<()> {
        let Self {
            generator,
            rng,
            histories,
        } = self;
        let histories = histories
            .as_mut()
            .ok_or_else(|| py_err("no histories yet; call run() first"))?;
        py.detach(|| generator.extend(histories, length, rng, ignored))
            .map_err(py_err)
    }

    fn get_histories(&self, py: Python<'_>) -> PyResult<Vec<Vec<Py<PyAny>>>> {
        match &self.histories {
            Some(h) => histories_to_py(py, h),
            None => Ok(Vec::new()),
        }
    }

    /// Charge at the end of each history.
    fn get_final_charges(&self) -> Vec<i32> {
        self.histories
            .iter()
            .flatten()
            .filter_map(|h| h.last().map(|e| e.charge))
            .collect()
    }
}

/// The chargewalk Python module entry point.
#[pymodule]
fn chargewalk(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_charge_histories, m)?)?;
    m.add_class::<ChargeWalk>()?;
    Ok(())
}
