use std::{
    io::Cursor,
    mem::size_of,
    path::{Path, PathBuf},
    sync::Arc,
};

use ash::vk;
use ash_renderer::vulkan::{Allocator, ComputePipeline, VulkanDevice};
use parking_lot::Mutex;
use vk_mem::Alloc;

use super::{
    kernels::{bitonic_schedule, cell_entry_budget},
    types::{
        GpuCellEntry, GpuColliderAabb, GpuCollisionPair, GpuCollisionResult, GpuCounters,
        GpuDispatchParams, COUNTER_ENTRIES, COUNTER_PAIRS, EMPTY_CELL,
    },
    CollisionComputeBackend, PassOutput,
};
use crate::{
    config::GpuCollisionConfig,
    error::{PhysicsError, Result},
    utils::logging::ScopedTimer,
};

const WORKGROUP_SIZE: u32 = 64;

// Descriptor bindings, shared by every shader.
const BINDING_AABBS: usize = 0;
const BINDING_PAIRS: usize = 1;
const BINDING_RESULTS: usize = 2;
const BINDING_COUNTERS: usize = 3;
const BINDING_ENTRIES: usize = 4;
const BINDING_COUNT: usize = 5;

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub allocation: vk_mem::Allocation,
    pub size: u64,
}

struct Pipelines {
    count: ComputePipeline,
    write: ComputePipeline,
    sort: ComputePipeline,
    pairs: ComputePipeline,
    narrow: ComputePipeline,
}

/// Vulkan implementation of the collision kernels.
///
/// Each pass is recorded into one reusable command buffer and the calling
/// thread blocks on a fence until the device finishes. Buffers live behind a
/// mutex, which also serializes use of the command buffer.
pub struct AshBackend {
    device: Arc<VulkanDevice>,
    allocator: Arc<Allocator>,
    queue: vk::Queue,

    set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    pipelines: Option<Pipelines>,

    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,

    buffers: Mutex<[Option<GpuBuffer>; BINDING_COUNT]>,
}

fn bytes_for<T>(count: usize) -> u64 {
    (count.max(1) * size_of::<T>()) as u64
}

fn capacity_of<T>(slot: &Option<GpuBuffer>) -> usize {
    slot.as_ref()
        .map(|buf| buf.size as usize / size_of::<T>())
        .unwrap_or(0)
}

fn buffer_of(slot: &Option<GpuBuffer>) -> Result<&GpuBuffer> {
    slot.as_ref().ok_or(PhysicsError::GpuNotInitialized)
}

fn shader_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.comp.spv"))
}

impl AshBackend {
    /// Builds pipelines from `shader_dir` and sizes buffers for `config`.
    pub fn new(
        device: Arc<VulkanDevice>,
        shader_dir: &Path,
        config: &GpuCollisionConfig,
    ) -> Result<Self> {
        let allocator = unsafe { Allocator::new(&device)? };
        let queue = device.graphics_queue;

        // Handles start null so a failed step below is cleaned up by Drop.
        let mut backend = Self {
            device,
            allocator: Arc::new(allocator),
            queue,
            set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set: vk::DescriptorSet::null(),
            pipelines: None,
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
            buffers: Mutex::new(Default::default()),
        };

        unsafe {
            backend.create_layouts()?;
            backend.create_pipelines(shader_dir)?;
            backend.create_command_objects()?;
        }
        backend.reserve(config)?;

        log::info!(
            "GPU collision backend ready ({} objects, {} pairs, {} results)",
            config.max_objects,
            config.max_pairs,
            config.max_results
        );
        Ok(backend)
    }

    unsafe fn create_layouts(&mut self) -> Result<()> {
        let device = &self.device.device;

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = (0..BINDING_COUNT as u32)
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::COMPUTE)
            })
            .collect();
        self.set_layout = device.create_descriptor_set_layout(
            &vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings),
            None,
        )?;

        let set_layouts = [self.set_layout];
        let push_ranges = [vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(size_of::<GpuDispatchParams>() as u32)];
        self.pipeline_layout = device.create_pipeline_layout(
            &vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_ranges),
            None,
        )?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(BINDING_COUNT as u32)];
        self.descriptor_pool = device.create_descriptor_pool(
            &vk::DescriptorPoolCreateInfo::default()
                .max_sets(1)
                .pool_sizes(&pool_sizes),
            None,
        )?;

        self.descriptor_set = device
            .allocate_descriptor_sets(
                &vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(self.descriptor_pool)
                    .set_layouts(&set_layouts),
            )?
            .into_iter()
            .next()
            .ok_or_else(|| PhysicsError::Vulkan("no descriptor set allocated".into()))?;
        Ok(())
    }

    unsafe fn create_pipelines(&mut self, shader_dir: &Path) -> Result<()> {
        self.pipelines = Some(Pipelines {
            count: self.load_pipeline(shader_dir, "spatial_hash_count")?,
            write: self.load_pipeline(shader_dir, "spatial_hash_write")?,
            sort: self.load_pipeline(shader_dir, "bitonic_sort")?,
            pairs: self.load_pipeline(shader_dir, "pair_generation")?,
            narrow: self.load_pipeline(shader_dir, "narrow_phase")?,
        });
        Ok(())
    }

    unsafe fn load_pipeline(&self, shader_dir: &Path, name: &str) -> Result<ComputePipeline> {
        let path = shader_path(shader_dir, name);
        let bytes = std::fs::read(&path).map_err(|source| PhysicsError::ShaderLoad {
            path: path.clone(),
            source,
        })?;
        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|source| PhysicsError::ShaderLoad { path, source })?;

        let device = &self.device.device;
        let module =
            device.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&code), None)?;
        let pipeline = ComputePipeline::new(device.clone(), self.pipeline_layout, module, c"main");
        device.destroy_shader_module(module, None);

        log::debug!("Loaded collision kernel {name}");
        Ok(pipeline?)
    }

    unsafe fn create_command_objects(&mut self) -> Result<()> {
        let device = &self.device.device;
        self.command_pool = device.create_command_pool(
            &vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                .queue_family_index(self.device.graphics_queue_family),
            None,
        )?;
        self.command_buffer = device
            .allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?
            .into_iter()
            .next()
            .ok_or_else(|| PhysicsError::Vulkan("no command buffer allocated".into()))?;
        self.fence = device.create_fence(&vk::FenceCreateInfo::default(), None)?;
        Ok(())
    }

    fn pipelines(&self) -> Result<&Pipelines> {
        self.pipelines.as_ref().ok_or(PhysicsError::GpuNotInitialized)
    }

    /// Grows `slot` to hold `size` bytes. Returns true when the buffer was replaced.
    fn ensure_buffer(&self, slot: &mut Option<GpuBuffer>, size: u64, binding: usize) -> Result<bool> {
        if let Some(buf) = slot {
            if buf.size >= size {
                return Ok(false);
            }
        }
        if let Some(mut old) = slot.take() {
            unsafe { self.allocator.destroy_buffer(old.buffer, &mut old.allocation) };
        }

        // Cell entries never leave the device; everything else is mapped.
        let host_visible = binding != BINDING_ENTRIES;
        let create_info = if host_visible {
            vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferHost,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT,
                ..Default::default()
            }
        } else {
            vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            }
        };

        let (buffer, allocation) = unsafe {
            self.allocator.vma.create_buffer(
                &vk::BufferCreateInfo::default()
                    .size(size)
                    .usage(
                        vk::BufferUsageFlags::STORAGE_BUFFER
                            | vk::BufferUsageFlags::TRANSFER_DST,
                    )
                    .sharing_mode(vk::SharingMode::EXCLUSIVE),
                &create_info,
            )?
        };
        log::info!("GPU collision buffer {binding} allocated: {size} bytes");
        *slot = Some(GpuBuffer {
            buffer,
            allocation,
            size,
        });
        Ok(true)
    }

    fn bind_buffers(&self, buffers: &[Option<GpuBuffer>; BINDING_COUNT]) -> Result<()> {
        let mut infos = Vec::with_capacity(BINDING_COUNT);
        for slot in buffers {
            infos.push(
                vk::DescriptorBufferInfo::default()
                    .buffer(buffer_of(slot)?.buffer)
                    .offset(0)
                    .range(vk::WHOLE_SIZE),
            );
        }
        let writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(self.descriptor_set)
                    .dst_binding(binding as u32)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(std::slice::from_ref(info))
            })
            .collect();
        unsafe { self.device.device.update_descriptor_sets(&writes, &[]) };
        Ok(())
    }

    /// Grows each binding to at least the requested element count, rebinding when needed.
    fn ensure_capacities(
        &self,
        buffers: &mut [Option<GpuBuffer>; BINDING_COUNT],
        objects: usize,
        pairs: usize,
        results: usize,
        entries: usize,
    ) -> Result<()> {
        let sizes = [
            bytes_for::<GpuColliderAabb>(objects),
            bytes_for::<GpuCollisionPair>(pairs),
            bytes_for::<GpuCollisionResult>(results),
            bytes_for::<GpuCounters>(1),
            bytes_for::<GpuCellEntry>(entries),
        ];
        let mut rebind = false;
        for (binding, size) in sizes.into_iter().enumerate() {
            rebind |= self.ensure_buffer(&mut buffers[binding], size, binding)?;
        }
        if rebind {
            self.bind_buffers(buffers)?;
        }
        Ok(())
    }

    fn upload<T: Copy>(&self, slot: &mut Option<GpuBuffer>, data: &[T]) -> Result<()> {
        let buf = slot.as_mut().ok_or(PhysicsError::GpuNotInitialized)?;
        let bytes = std::mem::size_of_val(data) as u64;
        if bytes > buf.size {
            return Err(PhysicsError::CapacityExceeded {
                resource: "upload",
                requested: bytes as usize,
                capacity: buf.size as usize,
            });
        }
        unsafe {
            let ptr = self.allocator.vma.map_memory(&mut buf.allocation)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<T>(), data.len());
            self.allocator.vma.unmap_memory(&mut buf.allocation);
        }
        Ok(())
    }

    fn download<T: Copy>(&self, slot: &mut Option<GpuBuffer>, count: usize) -> Result<Vec<T>> {
        let buf = slot.as_mut().ok_or(PhysicsError::GpuNotInitialized)?;
        let count = count.min(buf.size as usize / size_of::<T>());
        let mut out = Vec::with_capacity(count);
        unsafe {
            let ptr = self.allocator.vma.map_memory(&mut buf.allocation)?;
            std::ptr::copy_nonoverlapping(ptr.cast::<T>().cast_const(), out.as_mut_ptr(), count);
            out.set_len(count);
            self.allocator.vma.unmap_memory(&mut buf.allocation);
        }
        Ok(out)
    }

    fn reset_counters(&self, buffers: &mut [Option<GpuBuffer>; BINDING_COUNT]) -> Result<()> {
        self.upload(&mut buffers[BINDING_COUNTERS], &[0u32; 4])
    }

    fn read_counters(&self, buffers: &mut [Option<GpuBuffer>; BINDING_COUNT]) -> Result<GpuCounters> {
        let values = self.download::<u32>(&mut buffers[BINDING_COUNTERS], 4)?;
        let mut counters = [0; 4];
        counters[..values.len()].copy_from_slice(&values);
        Ok(counters)
    }

    /// Records with `record`, submits, and waits for completion.
    fn submit(&self, record: impl FnOnce(&ash::Device, vk::CommandBuffer)) -> Result<()> {
        let device = &self.device.device;
        let cmd = self.command_buffer;
        unsafe {
            device.reset_fences(&[self.fence])?;
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(
                cmd,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;

            record(device, cmd);
            host_barrier(device, cmd);

            device.end_command_buffer(cmd)?;
            let command_buffers = [cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device.queue_submit(self.queue, &[submit], self.fence)?;
            device.wait_for_fences(&[self.fence], true, u64::MAX)?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        pipeline: &ComputePipeline,
        params: &GpuDispatchParams,
        invocations: u32,
    ) {
        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline.handle());
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            device.cmd_push_constants(
                cmd,
                self.pipeline_layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                params.as_bytes(),
            );
            device.cmd_dispatch(cmd, invocations.div_ceil(WORKGROUP_SIZE).max(1), 1, 1);
        }
    }

    fn run_narrow_phase(
        &self,
        buffers: &mut [Option<GpuBuffer>; BINDING_COUNT],
        mut params: GpuDispatchParams,
        pair_count: usize,
    ) -> Result<Vec<GpuCollisionResult>> {
        let _timer = ScopedTimer::new("gpu narrow phase");
        params.pair_count = pair_count as u32;
        params.result_capacity = capacity_of::<GpuCollisionResult>(&buffers[BINDING_RESULTS]) as u32;

        let pipelines = self.pipelines()?;
        self.submit(|device, cmd| {
            self.dispatch(device, cmd, &pipelines.narrow, &params, params.pair_count);
        })?;
        self.download(&mut buffers[BINDING_RESULTS], pair_count)
    }
}

fn barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    (src_stage, src_access): (vk::PipelineStageFlags, vk::AccessFlags),
    (dst_stage, dst_access): (vk::PipelineStageFlags, vk::AccessFlags),
) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[barrier],
            &[],
            &[],
        );
    }
}

fn compute_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    barrier(
        device,
        cmd,
        (vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE),
        (
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        ),
    );
}

fn transfer_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    barrier(
        device,
        cmd,
        (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE),
        (
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        ),
    );
}

fn host_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    barrier(
        device,
        cmd,
        (vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE),
        (vk::PipelineStageFlags::HOST, vk::AccessFlags::HOST_READ),
    );
}

impl CollisionComputeBackend for AshBackend {
    fn name(&self) -> &str {
        "vulkan-ash"
    }

    fn reserve(&self, config: &GpuCollisionConfig) -> Result<()> {
        let mut buffers = self.buffers.lock();
        let objects = config.max_objects as usize;
        self.ensure_capacities(
            &mut buffers,
            objects,
            config.max_pairs as usize,
            config.max_results as usize,
            (objects * 8).next_power_of_two(),
        )
    }

    fn narrow_phase(
        &self,
        aabbs: &[GpuColliderAabb],
        pairs: &[GpuCollisionPair],
    ) -> Result<PassOutput> {
        let mut buffers = self.buffers.lock();
        self.ensure_capacities(&mut buffers, aabbs.len(), pairs.len(), pairs.len(), 1)?;
        self.upload(&mut buffers[BINDING_AABBS], aabbs)?;
        self.upload(&mut buffers[BINDING_PAIRS], pairs)?;

        let params = GpuDispatchParams {
            object_count: aabbs.len() as u32,
            pair_capacity: capacity_of::<GpuCollisionPair>(&buffers[BINDING_PAIRS]) as u32,
            ..GpuDispatchParams::default()
        };
        let results = self.run_narrow_phase(&mut buffers, params, pairs.len())?;
        Ok(PassOutput {
            results,
            entry_count: 0,
            pair_count: pairs.len() as u32,
        })
    }

    fn spatial_hash(
        &self,
        aabbs: &[GpuColliderAabb],
        config: &GpuCollisionConfig,
    ) -> Result<PassOutput> {
        let _timer = ScopedTimer::new("gpu spatial hash");
        cell_entry_budget(aabbs, config)?;
        let pipelines = self.pipelines()?;
        let mut buffers = self.buffers.lock();
        self.ensure_capacities(&mut buffers, aabbs.len(), 1, 1, 1)?;
        self.upload(&mut buffers[BINDING_AABBS], aabbs)?;

        let mut params = GpuDispatchParams::new(config, aabbs.len() as u32);

        // Count pass: exact number of cell entries.
        self.reset_counters(&mut buffers)?;
        self.submit(|device, cmd| {
            self.dispatch(device, cmd, &pipelines.count, &params, params.object_count);
        })?;
        let entry_count = self.read_counters(&mut buffers)?[COUNTER_ENTRIES];
        if entry_count > config.max_cell_entries {
            return Err(PhysicsError::CapacityExceeded {
                resource: "cell entry",
                requested: entry_count as usize,
                capacity: config.max_cell_entries as usize,
            });
        }

        let padded = entry_count.max(1).next_power_of_two();
        self.ensure_capacities(&mut buffers, aabbs.len(), 1, 1, padded as usize)?;
        params.entry_capacity = padded;

        // Write, sort, and pair generation; repeated once if pairs overflow.
        let pair_count = loop {
            params.pair_capacity = capacity_of::<GpuCollisionPair>(&buffers[BINDING_PAIRS]) as u32;
            self.reset_counters(&mut buffers)?;
            let entries = buffer_of(&buffers[BINDING_ENTRIES])?.buffer;

            self.submit(|device, cmd| {
                unsafe {
                    device.cmd_fill_buffer(
                        cmd,
                        entries,
                        0,
                        bytes_for::<GpuCellEntry>(padded as usize),
                        EMPTY_CELL,
                    );
                }
                transfer_barrier(device, cmd);

                self.dispatch(device, cmd, &pipelines.write, &params, params.object_count);
                compute_barrier(device, cmd);

                for (j, k) in bitonic_schedule(padded as usize) {
                    let pass = GpuDispatchParams {
                        sort_j: j as u32,
                        sort_k: k as u32,
                        ..params
                    };
                    self.dispatch(device, cmd, &pipelines.sort, &pass, padded);
                    compute_barrier(device, cmd);
                }

                self.dispatch(device, cmd, &pipelines.pairs, &params, entry_count);
            })?;

            let pair_count = self.read_counters(&mut buffers)?[COUNTER_PAIRS];
            if pair_count <= params.pair_capacity {
                break pair_count;
            }
            log::info!(
                "GPU pair buffer too small ({pair_count} > {}), growing",
                params.pair_capacity
            );
            self.ensure_capacities(
                &mut buffers,
                aabbs.len(),
                pair_count.next_power_of_two() as usize,
                1,
                padded as usize,
            )?;
        };

        self.ensure_capacities(
            &mut buffers,
            aabbs.len(),
            pair_count as usize,
            pair_count as usize,
            padded as usize,
        )?;
        let results = self.run_narrow_phase(&mut buffers, params, pair_count as usize)?;
        Ok(PassOutput {
            results,
            entry_count,
            pair_count,
        })
    }
}

impl Drop for AshBackend {
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            if let Err(err) = device.queue_wait_idle(self.queue) {
                log::warn!("Waiting for collision queue failed during teardown: {err}");
            }

            for slot in self.buffers.lock().iter_mut() {
                if let Some(mut buf) = slot.take() {
                    self.allocator.destroy_buffer(buf.buffer, &mut buf.allocation);
                }
            }

            self.pipelines = None;
            if self.fence != vk::Fence::null() {
                device.destroy_fence(self.fence, None);
            }
            if self.command_pool != vk::CommandPool::null() {
                device.destroy_command_pool(self.command_pool, None);
            }
            if self.descriptor_pool != vk::DescriptorPool::null() {
                device.destroy_descriptor_pool(self.descriptor_pool, None);
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
            if self.set_layout != vk::DescriptorSetLayout::null() {
                device.destroy_descriptor_set_layout(self.set_layout, None);
            }
        }
    }
}
