//! Writer для тестов, собирающий вывод `tracing` в общий буфер.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use tracing_subscriber::fmt::MakeWriter;

/// Writer, собирающий вывод в общий буфер.
#[derive(Clone, Default)]
pub(crate) struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

pub(crate) struct VecWriter(Arc<Mutex<Vec<u8>>>);

impl VecMakeWriter {
    /// Возвращает накопленный вывод в виде строки.
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for VecWriter {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for VecMakeWriter {
    type Writer = VecWriter;

    fn make_writer(&'a self) -> Self::Writer {
        VecWriter(self.0.clone())
    }
}
