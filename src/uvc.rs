/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/

//! UVC manager: moves frames from the capture FIFO of the fabric into
//! caller-supplied buffers, and arms the hardware that streams them to the
//! USB bulk endpoint.
//!
//! Buffers travel through a pair of queues held in [`BufferQueues`]:
//! - [`BufferQueues::enqueue`] hands an empty buffer to the manager
//! - [`UvcManager::process`] fills every queued buffer, in order
//! - [`BufferQueues::dequeue`] gives a filled buffer back
//!
//! The queues are `Sync` so producers and consumers may live in different
//! execution contexts. A buffer is owned by exactly one side at a time.

use core::cell::RefCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use embedded_hal::blocking::delay::DelayUs;
use heapless::Deque;

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use crate::device::{ControlId, VideoDevice};
use crate::format::{Caps, Endpoint, Format, FrameInterval};
use crate::Error;

/// Poll period of a blocking dequeue
const DEQUEUE_TICK_US: u32 = 1000;

/// A caller-owned frame buffer
#[derive(Debug)]
pub struct VideoBuffer<'a> {
    data: &'a mut [u8],
    bytes_used: usize,
    line_offset: u16,
}

impl<'a> VideoBuffer<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            bytes_used: 0,
            line_offset: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn line_offset(&self) -> u16 {
        self.line_offset
    }

    /// The filled part of the buffer
    pub fn data(&self) -> &[u8] {
        &self.data[..self.bytes_used]
    }

    pub fn into_inner(self) -> &'a mut [u8] {
        self.data
    }
}

/// An enqueue was refused. The buffer is handed back.
#[derive(Debug)]
pub enum EnqueueError<'a> {
    InvalidEndpoint(VideoBuffer<'a>),
    Full(VideoBuffer<'a>),
}

impl<'a> EnqueueError<'a> {
    pub fn into_buffer(self) -> VideoBuffer<'a> {
        match self {
            EnqueueError::InvalidEndpoint(buf) | EnqueueError::Full(buf) => buf,
        }
    }
}

/// How long `dequeue` waits for a filled buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    NoWait,
    Millis(u32),
    Forever,
}

/// Inbound (empty) and outbound (filled) buffer queues of one manager
pub struct BufferQueues<'a, const N: usize> {
    inbound: Mutex<RefCell<Deque<VideoBuffer<'a>, N>>>,
    outbound: Mutex<RefCell<Deque<VideoBuffer<'a>, N>>>,
    work_pending: AtomicBool,
}

impl<'a, const N: usize> BufferQueues<'a, N> {
    pub const fn new() -> Self {
        Self {
            inbound: Mutex::new(RefCell::new(Deque::new())),
            outbound: Mutex::new(RefCell::new(Deque::new())),
            work_pending: AtomicBool::new(false),
        }
    }

    /// Queue an empty buffer to be filled and request a worker pass
    pub fn enqueue(&self, ep: Endpoint, mut buf: VideoBuffer<'a>) -> Result<(), EnqueueError<'a>> {
        if !ep.is_output() {
            return Err(EnqueueError::InvalidEndpoint(buf));
        }
        buf.bytes_used = 0;
        critical_section::with(|cs| self.inbound.borrow_ref_mut(cs).push_back(buf))
            .map_err(EnqueueError::Full)?;
        self.work_pending.store(true, Ordering::Release);
        Ok(())
    }

    /// Take a filled buffer, waiting up to `timeout` for one to appear
    pub fn dequeue<D: DelayUs<u32>>(
        &self,
        ep: Endpoint,
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<VideoBuffer<'a>, Error<Infallible>> {
        if !ep.is_output() {
            return Err(Error::InvalidEndpoint);
        }
        let mut remaining = match timeout {
            Timeout::NoWait => Some(0),
            Timeout::Millis(ms) => Some(ms),
            Timeout::Forever => None,
        };
        loop {
            if let Some(buf) = critical_section::with(|cs| self.outbound.borrow_ref_mut(cs).pop_front())
            {
                return Ok(buf);
            }
            match remaining {
                Some(0) => return Err(Error::WouldBlock),
                Some(ref mut ms) => *ms -= 1,
                None => {}
            }
            delay.delay_us(DEQUEUE_TICK_US);
        }
    }

    /// Consume the pending-work notification
    pub fn take_pending(&self) -> bool {
        self.work_pending.swap(false, Ordering::AcqRel)
    }

    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.inbound.borrow_ref(cs).len())
    }

    pub fn completed(&self) -> usize {
        critical_section::with(|cs| self.outbound.borrow_ref(cs).len())
    }

    fn pop_inbound(&self) -> Option<VideoBuffer<'a>> {
        critical_section::with(|cs| self.inbound.borrow_ref_mut(cs).pop_front())
    }

    fn push_outbound(&self, buf: VideoBuffer<'a>) -> Result<(), VideoBuffer<'a>> {
        critical_section::with(|cs| self.outbound.borrow_ref_mut(cs).push_back(buf))
    }

    fn outbound_full(&self) -> bool {
        critical_section::with(|cs| self.outbound.borrow_ref(cs).is_full())
    }

    fn notify(&self) {
        self.work_pending.store(true, Ordering::Release);
    }
}

impl<'a, const N: usize> Default for BufferQueues<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// What the capture engine needs to feed a USB endpoint on its own
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub trb_addr: u32,
    pub depupdxfer: u32,
    pub depcmd: u32,
}

/// Lookup of the USB device controller state for an endpoint
pub trait UsbEndpointLookup {
    fn transfer_descriptor(&self, endpoint: u8) -> TransferDescriptor;
}

/// Capture and streaming engine of the fabric
pub trait UvcHardware {
    fn init(&mut self);

    /// Arm capture and hand frames to the USB endpoint described by `xfer`
    fn start(&mut self, xfer: &TransferDescriptor);

    fn stop(&mut self);

    fn set_format(&mut self, pitch: u32, height: u32);

    /// A zero size disables the pattern generator
    fn set_test_pattern(&mut self, width: u32, height: u32, pattern: i32);

    /// Copy `buf.len()` bytes out of the capture FIFO
    fn read(&mut self, buf: &mut [u8]);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UvcConfig {
    /// Address of the bulk IN endpoint the frames are streamed to
    pub usb_endpoint: u8,
}

/// End of the pipeline: owns the upstream stage and the capture hardware
pub struct UvcManager<'q, 'a, S, H, U, const N: usize> {
    source: S,
    hw: H,
    usb: U,
    config: UvcConfig,
    queues: &'q BufferQueues<'a, N>,
    /// Filled buffer still waiting for room in the outbound queue
    held: Option<VideoBuffer<'a>>,
}

impl<'q, 'a, S, H, U, const N: usize> UvcManager<'q, 'a, S, H, U, N>
where
    S: VideoDevice,
    H: UvcHardware,
    U: UsbEndpointLookup,
{
    pub fn new(
        source: S,
        hw: H,
        usb: U,
        config: UvcConfig,
        queues: &'q BufferQueues<'a, N>,
    ) -> Self {
        Self {
            source,
            hw,
            usb,
            config,
            queues,
            held: None,
        }
    }

    pub fn init(&mut self) {
        self.hw.init();
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn queues(&self) -> &'q BufferQueues<'a, N> {
        self.queues
    }

    pub fn release(self) -> (S, H, U) {
        (self.source, self.hw, self.usb)
    }

    /// Filled buffers the worker holds because the outbound queue was full
    pub fn held(&self) -> usize {
        self.held.is_some() as usize
    }

    /// Fill queued buffers until the inbound queue is empty or the outbound
    /// queue is full. Returns the number of buffers completed.
    pub fn process(&mut self) -> usize {
        let mut done = 0;
        if let Some(buf) = self.held.take() {
            if let Err(buf) = self.queues.push_outbound(buf) {
                self.held = Some(buf);
                return 0;
            }
            done += 1;
        }
        loop {
            if self.queues.outbound_full() {
                if self.queues.pending() > 0 {
                    #[cfg(feature = "rttdebug")]
                    rprintln!("uvc outbound queue full");
                    self.queues.notify();
                }
                break;
            }
            let Some(mut buf) = self.queues.pop_inbound() else {
                break;
            };
            buf.bytes_used = buf.size();
            buf.line_offset = 0;
            self.hw.read(buf.data);
            if let Err(buf) = self.queues.push_outbound(buf) {
                self.held = Some(buf);
                break;
            }
            done += 1;
        }
        done
    }

    /// Run a worker pass if buffers were enqueued since the last one
    pub fn poll(&mut self) -> usize {
        if self.queues.take_pending() || self.held.is_some() {
            self.process()
        } else {
            0
        }
    }
}

impl<'q, 'a, S, H, U, const N: usize> VideoDevice for UvcManager<'q, 'a, S, H, U, N>
where
    S: VideoDevice,
    H: UvcHardware,
    U: UsbEndpointLookup,
{
    type CommError = S::CommError;

    fn get_caps(&self, _ep: Endpoint) -> Result<Caps, Error<Self::CommError>> {
        self.source.get_caps(Endpoint::Out)
    }

    fn set_format(&mut self, ep: Endpoint, fmt: &Format) -> Result<(), Error<Self::CommError>> {
        if !ep.is_output() {
            return Err(Error::InvalidEndpoint);
        }
        self.source.set_format(Endpoint::Out, fmt)?;
        self.hw.set_format(fmt.pitch, fmt.height);
        Ok(())
    }

    fn get_format(&self, ep: Endpoint) -> Result<Format, Error<Self::CommError>> {
        if !ep.is_output() {
            return Err(Error::InvalidEndpoint);
        }
        self.source.get_format(Endpoint::Out)
    }

    fn set_frame_interval(
        &mut self,
        _ep: Endpoint,
        interval: &FrameInterval,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.set_frame_interval(Endpoint::Out, interval)
    }

    fn get_frame_interval(&self, _ep: Endpoint) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.get_frame_interval(Endpoint::Out)
    }

    fn enum_frame_interval(
        &self,
        _ep: Endpoint,
        fmt: &Format,
        index: usize,
    ) -> Result<FrameInterval, Error<Self::CommError>> {
        self.source.enum_frame_interval(Endpoint::Out, fmt, index)
    }

    /// Upstream starts before capture is armed, and capture is disarmed
    /// before upstream stops.
    fn set_stream(&mut self, on: bool) -> Result<(), Error<Self::CommError>> {
        if on {
            self.source.set_stream(true)?;
            let xfer = self.usb.transfer_descriptor(self.config.usb_endpoint);
            #[cfg(feature = "rttdebug")]
            rprintln!(
                "uvc start: trb 0x{:08x} depupdxfer 0x{:02x} depcmd 0x{:08x}",
                xfer.trb_addr,
                xfer.depupdxfer,
                xfer.depcmd
            );
            self.hw.start(&xfer);
        } else {
            self.hw.stop();
            self.source.set_stream(false)?;
        }
        Ok(())
    }

    fn set_ctrl(&mut self, id: ControlId, value: i32) -> Result<(), Error<Self::CommError>> {
        match id {
            ControlId::TestPattern if value == 0 => {
                self.hw.set_test_pattern(0, 0, 0);
                Ok(())
            }
            ControlId::TestPattern => {
                let fmt = self.get_format(Endpoint::Out)?;
                self.hw.set_test_pattern(fmt.width, fmt.height, value);
                Ok(())
            }
            _ => self.source.set_ctrl(id, value),
        }
    }

    fn get_ctrl(&self, id: ControlId) -> Result<i32, Error<Self::CommError>> {
        self.source.get_ctrl(id)
    }
}
